//! Quadkey addressing
//!
//! Pure conversions between tile coordinates `(level, x, y)`, quadkey strings
//! and pixel-space world offsets. A quadkey has one base-4 digit per level;
//! each digit selects a quadrant of its parent (0 = top-left, 1 = top-right,
//! 2 = bottom-left, 3 = bottom-right).

mod types;

pub use types::{tiles_per_side, CoordError, TileCoord, LEVEL_MAX, LEVEL_MIN, TILE_SIZE};

/// Converts tile coordinates into a quadkey at the given level of detail.
///
/// The returned string always has exactly `level` digits.
///
/// # Example
///
/// ```
/// use wmcache::coord::tile_to_quadkey;
///
/// assert_eq!(tile_to_quadkey(3, 5, 3), "213");
/// assert_eq!(tile_to_quadkey(0, 0, 0), "");
/// ```
pub fn tile_to_quadkey(x: u32, y: u32, level: u8) -> String {
    let mut quadkey = String::with_capacity(level as usize);
    for i in (1..=level).rev() {
        let mask = 1u32 << (i - 1);
        let mut digit = b'0';
        if x & mask != 0 {
            digit += 1;
        }
        if y & mask != 0 {
            digit += 2;
        }
        quadkey.push(digit as char);
    }
    quadkey
}

/// Converts a quadkey into `(x, y, level)`.
///
/// # Errors
///
/// Returns [`CoordError::InvalidQuadkey`] if the key is longer than
/// [`LEVEL_MAX`] or contains anything other than the digits `0`-`3`.
pub fn quadkey_to_tile(quadkey: &str) -> Result<(u32, u32, u8), CoordError> {
    if quadkey.len() > LEVEL_MAX as usize {
        return Err(CoordError::InvalidQuadkey(quadkey.to_string()));
    }

    let level = quadkey.len() as u8;
    let mut x = 0u32;
    let mut y = 0u32;
    for (i, digit) in quadkey.bytes().enumerate() {
        let mask = 1u32 << (level as usize - i - 1);
        match digit {
            b'0' => {}
            b'1' => x |= mask,
            b'2' => y |= mask,
            b'3' => {
                x |= mask;
                y |= mask;
            }
            _ => return Err(CoordError::InvalidQuadkey(quadkey.to_string())),
        }
    }
    Ok((x, y, level))
}

/// Pixel-space origin (upper-left pixel) of a tile.
#[inline]
pub fn tile_to_world_pixel(x: u32, y: u32) -> (i64, i64) {
    (
        i64::from(x) * i64::from(TILE_SIZE),
        i64::from(y) * i64::from(TILE_SIZE),
    )
}

/// Tile containing the given world pixel.
#[inline]
pub fn world_pixel_to_tile(pixel_x: i64, pixel_y: i64) -> (i64, i64) {
    (
        pixel_x.div_euclid(i64::from(TILE_SIZE)),
        pixel_y.div_euclid(i64::from(TILE_SIZE)),
    )
}

/// Width and height of the whole map in pixels at a level of detail.
#[inline]
pub fn map_size(level: u8) -> u64 {
    u64::from(TILE_SIZE) << level
}
