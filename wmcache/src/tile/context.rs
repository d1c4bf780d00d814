//! Shared services every tile needs.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::DiskStore;
use crate::config::{
    DEFAULT_FALLBACK_ENABLED, DEFAULT_FALLBACK_INITIAL_DELAY_SECS, DEFAULT_FALLBACK_INTERVAL_SECS,
    DEFAULT_FALLBACK_MAX_CUTS, DEFAULT_FALLBACK_STALENESS_SECS, DEFAULT_RESOLVE_WORKERS,
    DEFAULT_TILE_TTL_SECS,
};

/// Timing of the per-tile fallback search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSettings {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub interval: Duration,
    /// The search stops once the tile has gone unpainted this long.
    pub staleness: Duration,
    /// Deepest ancestor considered.
    pub max_cuts: u8,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_FALLBACK_ENABLED,
            initial_delay: Duration::from_secs(DEFAULT_FALLBACK_INITIAL_DELAY_SECS),
            interval: Duration::from_secs(DEFAULT_FALLBACK_INTERVAL_SECS),
            staleness: Duration::from_secs(DEFAULT_FALLBACK_STALENESS_SECS),
            max_cuts: DEFAULT_FALLBACK_MAX_CUTS,
        }
    }
}

/// Per-tile behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSettings {
    /// Lifetime given to generated tiles without their own expiration.
    pub default_ttl: Duration,
    pub fallback: FallbackSettings,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_TILE_TTL_SECS),
            fallback: FallbackSettings::default(),
        }
    }
}

/// Services shared by all tiles of an engine.
pub struct TileContext {
    pub store: Arc<DiskStore>,
    /// Runtime hosting resolve and fallback tasks.
    pub runtime: Handle,
    /// Bounds concurrent resolutions.
    pub resolve_permits: Arc<Semaphore>,
    pub settings: TileSettings,
    /// Parent of every tile task; cancelled on engine shutdown.
    pub shutdown: CancellationToken,
}

impl TileContext {
    pub fn new(store: Arc<DiskStore>, runtime: Handle, settings: TileSettings) -> Self {
        Self {
            store,
            runtime,
            resolve_permits: Arc::new(Semaphore::new(DEFAULT_RESOLVE_WORKERS)),
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_resolve_workers(mut self, workers: usize) -> Self {
        self.resolve_permits = Arc::new(Semaphore::new(workers.max(1)));
        self
    }
}
