//! Default configuration values.

use std::path::PathBuf;

use super::file::config_directory;

/// Debounce delay for expiration index persistence (2 minutes).
pub const DEFAULT_INDEX_SAVE_DELAY_SECS: u64 = 120;

/// Time-to-live applied to generated tiles that carry no expiration (7 days).
pub const DEFAULT_TILE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Whether tiles paint a cropped ancestor while loading.
pub const DEFAULT_FALLBACK_ENABLED: bool = true;

/// Period of the per-tile fallback search.
pub const DEFAULT_FALLBACK_INTERVAL_SECS: u64 = 30;

/// Delay before the first fallback search tick.
pub const DEFAULT_FALLBACK_INITIAL_DELAY_SECS: u64 = 1;

/// A tile not painted for this long stops searching for a fallback.
pub const DEFAULT_FALLBACK_STALENESS_SECS: u64 = 30;

/// Deepest ancestor considered by the fallback search.
pub const DEFAULT_FALLBACK_MAX_CUTS: u8 = 5;

/// Concurrent tile resolutions.
pub const DEFAULT_RESOLVE_WORKERS: usize = 8;

/// Default cache base directory (`~/.wmcache/cache`).
pub fn default_cache_dir() -> PathBuf {
    config_directory().join("cache")
}

/// Formats a byte count for display.
///
/// # Example
///
/// ```
/// use wmcache::config::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
