//! On-disk layout of the tile cache.
//!
//! ```text
//! <base>/<style>/z<level>/x<x>/y<y>.<ext>
//! <base>/serializedCaches/<style>
//! ```

use std::path::{Path, PathBuf};

use crate::coord::TileCoord;

/// Directory (under the cache base) holding serialized expiration indexes.
pub const SERIALIZED_CACHES_DIR: &str = "serializedCaches";

/// Returns true if `style` names exactly one directory directly under the
/// cache base.
///
/// Empty names, `.`, `..`, the index directory and names containing a path
/// separator, a drive colon or NUL are rejected.
///
/// # Example
///
/// ```
/// use wmcache::cache::is_valid_style_name;
///
/// assert!(is_valid_style_name("osm.v2"));
/// assert!(!is_valid_style_name("../osm"));
/// assert!(!is_valid_style_name("/etc"));
/// assert!(!is_valid_style_name("serializedCaches"));
/// ```
pub fn is_valid_style_name(style: &str) -> bool {
    !style.is_empty()
        && style != "."
        && style != ".."
        && style != SERIALIZED_CACHES_DIR
        && !style.contains(|c: char| matches!(c, '/' | '\\' | ':' | '\0'))
        && !Path::new(style).is_absolute()
}

/// Root directory of a style's cached tiles.
///
/// The name is joined as-is; callers check it with [`is_valid_style_name`].
pub fn style_directory(base: &Path, style: &str) -> PathBuf {
    base.join(style)
}

/// Path of a cached tile file.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use wmcache::cache::tile_path;
/// use wmcache::coord::TileCoord;
///
/// let coord = TileCoord::from_quadkey("0123").unwrap();
/// let path = tile_path(Path::new("/cache"), "osm", &coord, "png");
/// assert_eq!(path, Path::new("/cache/osm/z4/x5/y3.png"));
/// ```
pub fn tile_path(base: &Path, style: &str, coord: &TileCoord, extension: &str) -> PathBuf {
    style_directory(base, style)
        .join(format!("z{}", coord.level))
        .join(format!("x{}", coord.x))
        .join(format!("y{}.{}", coord.y, extension))
}

/// Path of a style's serialized expiration index.
pub fn index_path(base: &Path, style: &str) -> PathBuf {
    base.join(SERIALIZED_CACHES_DIR).join(style)
}

/// Parses a level directory name such as `z4`.
pub fn parse_level_dir(name: &str) -> Option<u8> {
    name.strip_prefix('z')?.parse().ok()
}

/// Parses a column directory name such as `x5`.
pub fn parse_column_dir(name: &str) -> Option<u32> {
    name.strip_prefix('x')?.parse().ok()
}

/// Parses a tile file name such as `y3.png`, requiring the given extension.
pub fn parse_row_file(name: &str, extension: &str) -> Option<u32> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    stem.strip_prefix('y')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_name_validation() {
        for good in ["osm", "osm.v2", "sat-2024", "..osm", "serializedCaches2"] {
            assert!(is_valid_style_name(good), "{good} should be accepted");
        }
        for bad in ["", ".", "..", "serializedCaches", "a/b", "../osm", "/tmp", "a\\b", "C:x", "a\0"] {
            assert!(!is_valid_style_name(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_tile_path_layout() {
        let coord = TileCoord::new(4, 5, 3).unwrap();
        let path = tile_path(Path::new("/tmp/cache"), "osm", &coord, "png");
        assert_eq!(path, PathBuf::from("/tmp/cache/osm/z4/x5/y3.png"));
    }

    #[test]
    fn test_index_path() {
        assert_eq!(
            index_path(Path::new("/c"), "osm"),
            PathBuf::from("/c/serializedCaches/osm")
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_level_dir("z12"), Some(12));
        assert_eq!(parse_level_dir("12"), None);
        assert_eq!(parse_column_dir("x0"), Some(0));
        assert_eq!(parse_column_dir("xa"), None);
        assert_eq!(parse_row_file("y3.png", "png"), Some(3));
        assert_eq!(parse_row_file("y3.jpg", "png"), None);
        assert_eq!(parse_row_file("y3png", "png"), None);
        assert_eq!(parse_row_file("y3.png.tmp", "png"), None);
    }
}
