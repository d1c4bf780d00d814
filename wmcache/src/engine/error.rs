//! Engine error types.

use thiserror::Error;

use crate::cache::StoreError;
use crate::coord::CoordError;
use crate::tile::TileError;

/// Errors returned by [`TileEngine`](super::TileEngine) operations.
///
/// Tile resolution failures are not reported here; they land in the tile's
/// state and last error message.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No style registered under this name.
    #[error("Unknown map style '{0}'")]
    UnknownStyle(String),

    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error("Disk cache error: {0}")]
    Store(#[from] StoreError),

    /// Failed to build the engine's own Tokio runtime.
    #[error("Failed to create runtime: {0}")]
    RuntimeCreation(std::io::Error),

    /// `start` was called outside a Tokio runtime, or `block_on` on an
    /// engine that does not own one.
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    /// A background cache task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            EngineError::UnknownStyle("osm".into()).to_string(),
            "Unknown map style 'osm'"
        );
        let coord: EngineError = CoordError::InvalidQuadkey("4".into()).into();
        assert!(coord.to_string().contains('4'));
    }
}
