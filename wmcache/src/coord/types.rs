//! Coordinate type definitions

use thiserror::Error;

/// Lowest level of detail (a single tile covers the world).
pub const LEVEL_MIN: u8 = 0;

/// Highest level of detail addressable by a quadkey.
pub const LEVEL_MAX: u8 = 22;

/// Width and height of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Position of a tile in the quadtree pyramid.
///
/// `x` grows eastward and `y` grows southward; both are `< 2^level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Level of detail (0-22)
    pub level: u8,
    /// Tile column
    pub x: u32,
    /// Tile row
    pub y: u32,
}

impl TileCoord {
    /// Creates a validated tile coordinate.
    pub fn new(level: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if level > LEVEL_MAX {
            return Err(CoordError::InvalidLevel(level));
        }
        let side = tiles_per_side(level);
        if u64::from(x) >= side || u64::from(y) >= side {
            return Err(CoordError::OutOfRange { level, x, y });
        }
        Ok(Self { level, x, y })
    }

    /// Decodes a quadkey into its tile coordinate.
    pub fn from_quadkey(quadkey: &str) -> Result<Self, CoordError> {
        let (x, y, level) = super::quadkey_to_tile(quadkey)?;
        Ok(Self { level, x, y })
    }

    /// Encodes this coordinate as a quadkey.
    pub fn quadkey(&self) -> String {
        super::tile_to_quadkey(self.x, self.y, self.level)
    }

    /// Pixel-space origin (top-left corner) of this tile at its own level.
    pub fn world_origin(&self) -> (i64, i64) {
        super::tile_to_world_pixel(self.x, self.y)
    }

    /// Returns the ancestor `cuts` levels coarser, or `None` past the root.
    pub fn ancestor(&self, cuts: u8) -> Option<Self> {
        if cuts > self.level {
            return None;
        }
        Some(Self {
            level: self.level - cuts,
            x: self.x >> cuts,
            y: self.y >> cuts,
        })
    }

    /// Returns the parent tile (one level coarser).
    pub fn parent(&self) -> Option<Self> {
        self.ancestor(1)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "z{}/x{}/y{}", self.level, self.x, self.y)
    }
}

/// Number of tiles along one side of the pyramid at `level`.
#[inline]
pub fn tiles_per_side(level: u8) -> u64 {
    1u64 << level
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Level of detail is outside the addressable range
    #[error("Invalid level of detail: {0} (must be between {min} and {max})", min = LEVEL_MIN, max = LEVEL_MAX)]
    InvalidLevel(u8),

    /// Tile column or row does not exist at the given level
    #[error("Tile x={x}, y={y} is outside level {level}")]
    OutOfRange { level: u8, x: u32, y: u32 },

    /// Quadkey contains invalid characters or is too long
    #[error("Invalid quadkey: '{0}' (must contain only digits 0-3 and length <= {max})", max = LEVEL_MAX)]
    InvalidQuadkey(String),
}
