use crate::coord::TileCoord;

use super::{GenerateError, GeneratedRaster, MapStyle};

/// A style that only serves tiles already present in the disk cache.
///
/// Generation always fails recoverably, so missing tiles end up in `ERROR`
/// and may be retried once the cache has been populated by other means.
#[derive(Debug, Clone)]
pub struct CacheOnlyStyle {
    name: String,
    base_or_layer: bool,
}

impl CacheOnlyStyle {
    /// A base-map style.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_or_layer: true,
        }
    }

    /// A semi-transparent overlay style.
    pub fn overlay(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_or_layer: false,
        }
    }
}

impl MapStyle for CacheOnlyStyle {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_base_or_layer(&self) -> bool {
        self.base_or_layer
    }

    fn generate(&self, coord: &TileCoord) -> Result<GeneratedRaster, GenerateError> {
        Err(GenerateError::Failed(format!(
            "style '{}' serves cached tiles only, {} is not cached",
            self.name, coord
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_only_never_generates() {
        let style = CacheOnlyStyle::new("OpenStreetMap");
        let coord = TileCoord::from_quadkey("0123").unwrap();

        let err = style.generate(&coord).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("z4/x5/y3"));
        assert!(style.is_base_or_layer());
        assert!(!CacheOnlyStyle::overlay("Seamarks").is_base_or_layer());
    }
}
