//! wmcache - quadtree map tile cache and multi-resolution renderer
//!
//! Tiles are addressed by quadkey and cached on disk as PNG files that carry
//! their own expiration date. While a tile resolves, painting falls back to a
//! cropped, upscaled ancestor found in the cache.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wmcache::engine::{EngineConfig, TileEngine};
//! use wmcache::style::CacheOnlyStyle;
//!
//! # async fn run() -> Result<(), wmcache::engine::EngineError> {
//! let engine = TileEngine::start(EngineConfig::new("/var/cache/tiles"))?;
//! engine.register_style(Arc::new(CacheOnlyStyle::new("osm")));
//! engine.set_cache("osm", true);
//!
//! let tile = engine.request_tile("osm", "0123")?;
//! let state = tile.resolved().await;
//! println!("{} is {}", tile.id(), state);
//!
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod engine;
pub mod logging;
pub mod style;
pub mod tile;
pub mod time;

pub use coord::{TileCoord, LEVEL_MAX, TILE_SIZE};
pub use engine::{EngineConfig, EngineError, TileEngine};
pub use style::{GenerateError, GeneratedRaster, MapStyle};
pub use tile::{Tile, TileState};

/// Crate version, from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
