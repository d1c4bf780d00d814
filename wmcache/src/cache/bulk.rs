//! Whole-style cache walking.
//!
//! Used by the disk store for style wipes, preloads and usage reports. These
//! helpers perform no locking; callers hold the style's lock.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::path::{parse_column_dir, parse_level_dir, parse_row_file};
use crate::config::format_size;
use crate::coord::TileCoord;

/// Outcome of wiping a style's cache subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Number of files removed.
    pub files_deleted: usize,
    /// Total size of the removed files.
    pub bytes_freed: u64,
}

impl fmt::Display for ClearResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed {} files, freed {}",
            self.files_deleted,
            format_size(self.bytes_freed)
        )
    }
}

/// Tile files held on disk for one style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCacheStats {
    pub tiles: usize,
    pub bytes: u64,
}

impl fmt::Display for DiskCacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tiles, {}", self.tiles, format_size(self.bytes))
    }
}

/// Lists every tile file under a style directory.
///
/// Walks `z<level>/x<x>/y<y>.<extension>`, skipping names that do not
/// parse and coordinates outside their level. A missing directory yields
/// an empty list. Results are sorted by coordinate.
pub fn scan_style_directory(
    style_dir: &Path,
    extension: &str,
) -> io::Result<Vec<(TileCoord, PathBuf)>> {
    let levels = match fs::read_dir(style_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut tiles = Vec::new();
    for level_entry in levels.filter_map(|e| e.ok()) {
        let Some(level) = dir_name(&level_entry).and_then(|n| parse_level_dir(&n)) else {
            continue;
        };

        let columns = match fs::read_dir(level_entry.path()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %level_entry.path().display(), error = %e, "Failed to read level directory");
                continue;
            }
        };

        for column_entry in columns.filter_map(|e| e.ok()) {
            let Some(x) = dir_name(&column_entry).and_then(|n| parse_column_dir(&n)) else {
                continue;
            };

            let rows = match fs::read_dir(column_entry.path()) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %column_entry.path().display(), error = %e, "Failed to read column directory");
                    continue;
                }
            };

            for row_entry in rows.filter_map(|e| e.ok()) {
                if !row_entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let name = row_entry.file_name();
                let Some(y) = parse_row_file(&name.to_string_lossy(), extension) else {
                    continue;
                };

                match TileCoord::new(level, x, y) {
                    Ok(coord) => tiles.push((coord, row_entry.path())),
                    Err(e) => debug!(path = %row_entry.path().display(), error = %e, "Skipping tile file"),
                }
            }
        }
    }

    tiles.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(tiles)
}

/// Counts all files and bytes beneath a directory.
///
/// A missing directory counts as empty.
pub fn directory_usage(dir: &Path) -> io::Result<ClearResult> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ClearResult::default()),
        Err(e) => return Err(e),
    };

    let mut usage = ClearResult::default();
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let nested = directory_usage(&entry.path())?;
            usage.files_deleted += nested.files_deleted;
            usage.bytes_freed += nested.bytes_freed;
        } else {
            usage.files_deleted += 1;
            usage.bytes_freed += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(usage)
}

/// Counts the tile files of a style.
pub fn disk_cache_stats(style_dir: &Path, extension: &str) -> io::Result<DiskCacheStats> {
    let tiles = scan_style_directory(style_dir, extension)?;
    let bytes = tiles
        .iter()
        .filter_map(|(_, path)| fs::metadata(path).ok())
        .map(|m| m.len())
        .sum();
    Ok(DiskCacheStats {
        tiles: tiles.len(),
        bytes,
    })
}

fn dir_name(entry: &fs::DirEntry) -> Option<String> {
    if !entry.file_type().ok()?.is_dir() {
        return None;
    }
    Some(entry.file_name().to_string_lossy().into_owned())
}
