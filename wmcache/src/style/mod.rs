//! Map style capability contract.
//!
//! A style names a tile set, decides how its tiles are composited and knows
//! how to produce a tile's raster when the disk cache cannot serve it. How
//! the pixels are produced (network fetch, procedural rendering) is entirely
//! up to the implementor.
//!
//! # Example
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use wmcache::coord::TileCoord;
//! use wmcache::style::{GenerateError, GeneratedRaster, MapStyle};
//!
//! struct Checkerboard;
//!
//! impl MapStyle for Checkerboard {
//!     fn name(&self) -> &str {
//!         "Checkerboard"
//!     }
//!
//!     fn generate(&self, coord: &TileCoord) -> Result<GeneratedRaster, GenerateError> {
//!         let shade = if (coord.x + coord.y) % 2 == 0 { 40 } else { 220 };
//!         Ok(GeneratedRaster::new(RgbaImage::from_pixel(
//!             256,
//!             256,
//!             Rgba([shade, shade, shade, 255]),
//!         )))
//!     }
//! }
//! ```

mod cache_only;
mod registry;

pub use cache_only::CacheOnlyStyle;
pub use registry::{default_factory, RegisteredStyle, StyleRegistry, TileFactory};

use image::RgbaImage;
use thiserror::Error;

use crate::coord::{TileCoord, LEVEL_MAX};

/// Compositing alpha used when painting with transparency enabled.
pub const DEFAULT_TRANSPARENCY: f32 = 0.4;

/// Raster produced by a style.
#[derive(Debug, Clone)]
pub struct GeneratedRaster {
    pub raster: RgbaImage,
    /// Expiration in epoch milliseconds; the engine default TTL applies
    /// when absent.
    pub expiration: Option<i64>,
}

impl GeneratedRaster {
    pub fn new(raster: RgbaImage) -> Self {
        Self {
            raster,
            expiration: None,
        }
    }

    pub fn with_expiration(mut self, expiration: i64) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// Failure to produce a tile's raster.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// Recoverable; the tile enters `ERROR` and may be retried.
    #[error("{0}")]
    Failed(String),

    /// Retrying is pointless; the tile enters `FATAL_ERROR`.
    #[error("{0}")]
    Fatal(String),
}

impl GenerateError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerateError::Fatal(_))
    }
}

/// Capabilities a tile style exposes to the engine.
///
/// `generate` runs on a blocking worker thread and may take as long as it
/// needs.
pub trait MapStyle: Send + Sync {
    /// Style name; also the cache directory name.
    fn name(&self) -> &str;

    /// Opaque base map or layer (as opposed to a semi-transparent overlay).
    ///
    /// Only base/layer tiles are checked for an alpha channel of their own.
    fn is_base_or_layer(&self) -> bool {
        true
    }

    /// Whether tiles of this style can be fetched or generated at all.
    fn is_fetchable_or_generated(&self) -> bool {
        false
    }

    /// Alpha applied when painting with transparency on.
    fn transparency(&self) -> f32 {
        DEFAULT_TRANSPARENCY
    }

    /// Deepest level this style serves.
    fn max_level_of_detail(&self) -> u8 {
        LEVEL_MAX
    }

    /// Produces the raster for a tile.
    fn generate(&self, coord: &TileCoord) -> Result<GeneratedRaster, GenerateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl MapStyle for Minimal {
        fn name(&self) -> &str {
            "Minimal"
        }

        fn generate(&self, _coord: &TileCoord) -> Result<GeneratedRaster, GenerateError> {
            Err(GenerateError::Fatal("unreachable source".to_string()))
        }
    }

    #[test]
    fn test_trait_defaults() {
        let style = Minimal;
        assert!(style.is_base_or_layer());
        assert!(!style.is_fetchable_or_generated());
        assert_eq!(style.transparency(), DEFAULT_TRANSPARENCY);
        assert_eq!(style.max_level_of_detail(), LEVEL_MAX);
    }

    #[test]
    fn test_generate_error_kinds() {
        let coord = TileCoord::new(0, 0, 0).unwrap();
        let err = Minimal.generate(&coord).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "unreachable source");
        assert!(!GenerateError::Failed("x".into()).is_fatal());
    }

    #[test]
    fn test_generated_raster_expiration() {
        let raster = GeneratedRaster::new(RgbaImage::new(1, 1));
        assert_eq!(raster.expiration, None);
        assert_eq!(raster.with_expiration(5).expiration, Some(5));
    }
}
