//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{default_cache_dir, ConfigFile, DEFAULT_INDEX_SAVE_DELAY_SECS, DEFAULT_RESOLVE_WORKERS};
use crate::tile::{FallbackSettings, TileSettings};

/// Everything needed to start a [`TileEngine`](super::TileEngine).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wmcache::engine::EngineConfig;
///
/// let config = EngineConfig::new("/tmp/tiles")
///     .with_resolve_workers(4)
///     .with_default_ttl(Duration::from_secs(3600));
///
/// assert_eq!(config.resolve_workers(), 4);
/// assert_eq!(config.tile_settings().default_ttl, Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    cache_dir: PathBuf,
    index_save_delay: Duration,
    resolve_workers: usize,
    tile: TileSettings,
}

impl EngineConfig {
    /// Default settings with the given cache base directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            index_save_delay: Duration::from_secs(DEFAULT_INDEX_SAVE_DELAY_SECS),
            resolve_workers: DEFAULT_RESOLVE_WORKERS,
            tile: TileSettings::default(),
        }
    }

    /// Translates a parsed configuration file.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        let fallback = FallbackSettings {
            enabled: file.fallback.enabled,
            initial_delay: Duration::from_secs(file.fallback.initial_delay_secs),
            interval: Duration::from_secs(file.fallback.interval_secs),
            staleness: Duration::from_secs(file.fallback.staleness_secs),
            max_cuts: file.fallback.max_cuts,
        };

        Self::new(file.cache.directory.clone())
            .with_index_save_delay(Duration::from_secs(file.cache.index_save_delay_secs))
            .with_resolve_workers(file.engine.resolve_workers)
            .with_default_ttl(Duration::from_secs(file.cache.default_ttl_secs))
            .with_fallback(fallback)
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_index_save_delay(mut self, delay: Duration) -> Self {
        self.index_save_delay = delay;
        self
    }

    /// Maximum number of tiles resolving at once. Zero is treated as one.
    pub fn with_resolve_workers(mut self, workers: usize) -> Self {
        self.resolve_workers = workers.max(1);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.tile.default_ttl = ttl;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackSettings) -> Self {
        self.tile.fallback = fallback;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn index_save_delay(&self) -> Duration {
        self.index_save_delay
    }

    pub fn resolve_workers(&self) -> usize {
        self.resolve_workers
    }

    pub fn tile_settings(&self) -> &TileSettings {
        &self.tile
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(default_cache_dir())
    }
}
