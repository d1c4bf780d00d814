//! Wall-clock helpers.
//!
//! Expiration timestamps are stored as milliseconds since the Unix epoch,
//! both inside cached files and in the serialized expiration index.

use std::time::Duration;

use chrono::{TimeZone, Utc};

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Adds a duration to an epoch-millisecond timestamp, saturating on overflow.
pub fn add_duration(millis: i64, duration: Duration) -> i64 {
    let delta = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
    millis.saturating_add(delta)
}

/// Formats an epoch-millisecond timestamp as RFC 3339 (UTC).
///
/// Returns the raw number when it does not map to a valid date.
pub fn format_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.to_rfc3339(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_add_duration() {
        assert_eq!(add_duration(1_000, Duration::from_secs(2)), 3_000);
        assert_eq!(add_duration(i64::MAX - 1, Duration::from_secs(1)), i64::MAX);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00+00:00");
    }
}
