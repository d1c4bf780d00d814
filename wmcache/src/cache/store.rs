//! Disk-backed tile store.
//!
//! Tile loads and saves take the shared side of a per-style read-write lock
//! and may interleave freely. A style wipe takes the exclusive side, so no
//! load ever observes a half-deleted style directory and no save races the
//! deletion.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use image::RgbaImage;
use parking_lot::RwLock;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::bulk::{self, ClearResult, DiskCacheStats};
use super::codec::{CodecError, DecodedRaster, ExpirationField, TileCodec};
use super::expiration::ExpirationIndex;
use super::path::{is_valid_style_name, style_directory, tile_path};
use crate::coord::TileCoord;

/// Errors from disk store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No cached file exists for the tile.
    #[error("Tile not found in cache: {}", .0.display())]
    NotFound(PathBuf),

    /// The cached file exists but must be refreshed.
    #[error("Cached tile expired: {}", .path.display())]
    Expired {
        path: PathBuf,
        /// Embedded expiration when it could be read.
        expiration: Option<i64>,
    },

    /// The cached file could not be decoded and was deleted.
    #[error("Corrupt cached tile {} removed: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The style name does not name a single directory under the cache base.
    #[error("Invalid map style name '{0}'")]
    InvalidStyle(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Returns true for conditions the caller resolves by generating the tile.
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::Expired { .. } | StoreError::Corrupt { .. }
        )
    }
}

/// A tile read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedTile {
    pub raster: DecodedRaster,
    /// Expiration known for the file, from the index or its metadata.
    pub expiration: Option<i64>,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Tile files for every style under one cache base directory.
pub struct DiskStore {
    base_dir: PathBuf,
    codec: Arc<dyn TileCodec>,
    index: Arc<ExpirationIndex>,
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl DiskStore {
    pub fn new(codec: Arc<dyn TileCodec>, index: Arc<ExpirationIndex>) -> Self {
        Self {
            base_dir: index.base_dir().to_path_buf(),
            codec,
            index,
            locks: DashMap::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn index(&self) -> &Arc<ExpirationIndex> {
        &self.index
    }

    pub fn codec(&self) -> &Arc<dyn TileCodec> {
        &self.codec
    }

    /// Path of a tile's cache file.
    pub fn tile_path(&self, style: &str, coord: &TileCoord) -> PathBuf {
        tile_path(&self.base_dir, style, coord, self.codec.extension())
    }

    fn style_lock(&self, style: &str) -> Arc<RwLock<()>> {
        Arc::clone(&self.locks.entry(style.to_string()).or_default())
    }

    /// Lock for a style whose name is safe to join under the base directory.
    fn checked_style_lock(&self, style: &str) -> Result<Arc<RwLock<()>>, StoreError> {
        if !is_valid_style_name(style) {
            warn!(style, "Rejected invalid map style name");
            return Err(StoreError::InvalidStyle(style.to_string()));
        }
        Ok(self.style_lock(style))
    }

    /// Loads a tile that is present on disk and not expired.
    ///
    /// When the index has no live entry for the tile, the file's embedded
    /// expiration is read and recorded in the index. Expired files are kept
    /// on disk; files that fail to decode are deleted.
    pub fn load(&self, style: &str, coord: &TileCoord, now: i64) -> Result<LoadedTile, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _shared = lock.read();

        let path = self.tile_path(style, coord);
        let id = coord.quadkey();
        let indexed = self.index.get(style, &id);
        let possibly_expired = indexed.map_or(true, |expiration| expiration <= now);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut expiration = indexed;
        if possibly_expired {
            match self.codec.read_expiration(&bytes) {
                Ok(ExpirationField::At(value)) => {
                    self.index.record(style, &id, value);
                    self.index.schedule_save();
                    expiration = Some(value);
                    if value <= now {
                        debug!(style, tile = %id, expiration = value, "Cached tile expired");
                        return Err(StoreError::Expired {
                            path,
                            expiration: Some(value),
                        });
                    }
                }
                Ok(ExpirationField::Unparseable(raw)) => {
                    warn!(style, tile = %id, value = %raw, "Unparseable expiration in cached tile, forcing refresh");
                    return Err(StoreError::Expired {
                        path,
                        expiration: None,
                    });
                }
                Ok(ExpirationField::Missing) => {
                    debug!(style, tile = %id, "Cached tile has no expiration, forcing refresh");
                    return Err(StoreError::Expired {
                        path,
                        expiration: None,
                    });
                }
                Err(e) => return Err(discard_corrupt(path, e)),
            }
        }

        match self.codec.decode(&bytes) {
            Ok(raster) => {
                debug!(style, tile = %id, "Loaded tile from disk cache");
                Ok(LoadedTile { raster, expiration })
            }
            Err(e) => Err(discard_corrupt(path, e)),
        }
    }

    /// Writes a tile with its embedded expiration and records it in the index.
    pub fn save(
        &self,
        style: &str,
        coord: &TileCoord,
        raster: &RgbaImage,
        expiration: i64,
    ) -> Result<PathBuf, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _shared = lock.read();

        let path = self.tile_path(style, coord);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = self.codec.encode(raster, expiration)?;
        let temp_path = path.with_extension(format!(
            "{}.{}.tmp",
            self.codec.extension(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }

        let id = coord.quadkey();
        self.index.record(style, &id, expiration);
        self.index.schedule_save();

        debug!(style, tile = %id, expiration, bytes = bytes.len(), "Saved tile to disk cache");
        Ok(path)
    }

    /// Decodes an ancestor tile for fallback rendering.
    ///
    /// Expiration is ignored and nothing is ever deleted here; a missing or
    /// unreadable file is simply `None`.
    pub fn read_ancestor(&self, style: &str, coord: &TileCoord) -> Option<DecodedRaster> {
        let lock = self.checked_style_lock(style).ok()?;
        let _shared = lock.read();

        let path = self.tile_path(style, coord);
        let bytes = fs::read(&path).ok()?;
        match self.codec.decode(&bytes) {
            Ok(raster) => Some(raster),
            Err(e) => {
                debug!(style, path = %path.display(), error = %e, "Ancestor tile unreadable");
                None
            }
        }
    }

    /// Reads a cached tile's embedded expiration field.
    pub fn read_expiration(
        &self,
        style: &str,
        coord: &TileCoord,
    ) -> Result<ExpirationField, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _shared = lock.read();

        let path = self.tile_path(style, coord);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(self.codec.read_expiration(&bytes)?)
    }

    /// Deletes a style's entire cache subtree under the exclusive lock.
    ///
    /// The style's index entries are dropped as well. A missing directory is
    /// a successful no-op.
    pub fn clear_style(&self, style: &str) -> Result<ClearResult, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _exclusive = lock.write();

        let dir = style_directory(&self.base_dir, style);
        let usage = bulk::directory_usage(&dir)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }

        self.index.remove_style_entries(style);
        if self.index.is_loaded(style) {
            self.index.schedule_save();
        }

        info!(style, files = usage.files_deleted, bytes = usage.bytes_freed, "Cleared disk cache");
        Ok(usage)
    }

    /// Decodes every tile file of a style in parallel.
    ///
    /// Files that fail to decode are deleted and left out of the result.
    pub fn preload(&self, style: &str) -> Result<Vec<(TileCoord, DecodedRaster)>, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _shared = lock.read();

        let dir = style_directory(&self.base_dir, style);
        let files = bulk::scan_style_directory(&dir, self.codec.extension())?;
        let codec = &self.codec;

        let loaded: Vec<(TileCoord, DecodedRaster)> = files
            .par_iter()
            .filter_map(|(coord, path)| {
                let decoded = fs::read(path)
                    .map_err(StoreError::Io)
                    .and_then(|bytes| codec.decode(&bytes).map_err(StoreError::Codec));
                match decoded {
                    Ok(raster) => Some((*coord, raster)),
                    Err(StoreError::Codec(e)) => {
                        let _ = discard_corrupt(path.clone(), e);
                        None
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to read cached tile");
                        None
                    }
                }
            })
            .collect();

        info!(style, found = files.len(), loaded = loaded.len(), "Preloaded disk cache");
        Ok(loaded)
    }

    /// Counts the tile files of a style.
    pub fn stats(&self, style: &str) -> Result<DiskCacheStats, StoreError> {
        let lock = self.checked_style_lock(style)?;
        let _shared = lock.read();

        let dir = style_directory(&self.base_dir, style);
        Ok(bulk::disk_cache_stats(&dir, self.codec.extension())?)
    }
}

fn discard_corrupt(path: PathBuf, error: CodecError) -> StoreError {
    warn!(path = %path.display(), error = %error, "Deleting corrupt cached tile");
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete corrupt cached tile");
        }
    }
    StoreError::Corrupt {
        path,
        reason: error.to_string(),
    }
}
