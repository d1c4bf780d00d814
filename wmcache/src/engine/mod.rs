//! The tile engine: one object owning the cache, the styles and the
//! background work.
//!
//! ```text
//! EngineConfig ──► TileEngine
//!                    ├── ExpirationIndex   (debounced persistence task)
//!                    ├── DiskStore         (per-style RW locks)
//!                    ├── StyleRegistry     (style + tile factory)
//!                    └── TileContext       (resolve permits, shutdown token)
//! ```
//!
//! The engine either borrows the ambient Tokio runtime ([`TileEngine::start`])
//! or owns one ([`TileEngine::start_sync`]) for synchronous callers.

mod config;
mod error;

pub use config::EngineConfig;
pub use error::EngineError;

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    ClearResult, DiskCacheStats, DiskStore, ExpirationField, ExpirationIndex, PngCodec, StoreError,
};
use crate::coord::TileCoord;
use crate::style::{MapStyle, RegisteredStyle, StyleRegistry, TileFactory};
use crate::tile::{Tile, TileContext};

/// Tile cache and rendering engine.
pub struct TileEngine {
    ctx: Arc<TileContext>,
    registry: StyleRegistry,
    config: EngineConfig,
    // Declared last so the tile context's handle is dropped first.
    runtime: Option<Runtime>,
}

impl TileEngine {
    /// Starts the engine on the current Tokio runtime.
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let handle = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        Ok(Self::build(config, handle, None))
    }

    /// Starts the engine on a multi-threaded runtime it owns.
    ///
    /// Must not be called, or the engine dropped, from within another
    /// runtime.
    pub fn start_sync(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("wmcache-worker")
            .build()
            .map_err(EngineError::RuntimeCreation)?;
        let handle = runtime.handle().clone();
        Ok(Self::build(config, handle, Some(runtime)))
    }

    fn build(config: EngineConfig, handle: Handle, runtime: Option<Runtime>) -> Self {
        let index = Arc::new(ExpirationIndex::new(
            config.cache_dir(),
            config.index_save_delay(),
            handle.clone(),
        ));
        let store = Arc::new(DiskStore::new(Arc::new(PngCodec::new()), index));
        let ctx = TileContext::new(store, handle, config.tile_settings().clone())
            .with_resolve_workers(config.resolve_workers());

        info!(
            cache_dir = %config.cache_dir().display(),
            resolve_workers = config.resolve_workers(),
            fallback = config.tile_settings().fallback.enabled,
            owns_runtime = runtime.is_some(),
            "Tile engine started"
        );

        Self {
            ctx: Arc::new(ctx),
            registry: StyleRegistry::new(),
            config,
            runtime,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<TileContext> {
        &self.ctx
    }

    pub fn store(&self) -> &Arc<DiskStore> {
        &self.ctx.store
    }

    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    /// Handle of the runtime hosting the engine's tasks.
    pub fn runtime_handle(&self) -> &Handle {
        &self.ctx.runtime
    }

    /// Runs a future to completion on the engine's own runtime.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, EngineError> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.block_on(future)),
            None => Err(EngineError::NoRuntime(
                "engine was started on a borrowed runtime".to_string(),
            )),
        }
    }

    /// Registers a style with the default tile factory.
    pub fn register_style(&self, style: Arc<dyn MapStyle>) {
        debug!(style = style.name(), "Registering style");
        self.registry.register(style);
    }

    pub fn register_style_with_factory(&self, style: Arc<dyn MapStyle>, factory: TileFactory) {
        debug!(style = style.name(), "Registering style with custom factory");
        self.registry.register_with_factory(style, factory);
    }

    fn registered(&self, style: &str) -> Result<RegisteredStyle, EngineError> {
        self.registry
            .get(style)
            .ok_or_else(|| EngineError::UnknownStyle(style.to_string()))
    }

    /// Creates a tile by quadkey and starts resolving it in the background.
    pub fn request_tile(&self, style: &str, id: &str) -> Result<Arc<Tile>, EngineError> {
        let registered = self.registered(style)?;
        Ok(Tile::request(&self.ctx, registered.style, id)?)
    }

    /// Wraps an in-memory raster as a `LOADED` tile.
    pub fn tile_from_raster(
        &self,
        style: &str,
        level: u8,
        x: u32,
        y: u32,
        raster: RgbaImage,
    ) -> Result<Arc<Tile>, EngineError> {
        let registered = self.registered(style)?;
        Ok(Tile::from_raster(&self.ctx, registered.style, level, x, y, raster)?)
    }

    /// Loads or drops a style's expiration index.
    pub fn set_cache(&self, style: &str, enabled: bool) {
        self.ctx.store.index().set_cache(style, enabled);
    }

    /// Wipes a style's disk cache on a blocking worker.
    ///
    /// In-flight saves of the style finish before the wipe starts; saves
    /// issued meanwhile wait for it.
    pub fn clear_disk_cache(&self, style: &str) -> JoinHandle<Result<ClearResult, StoreError>> {
        let store = Arc::clone(&self.ctx.store);
        let style = style.to_string();
        self.ctx
            .runtime
            .spawn_blocking(move || store.clear_style(&style))
    }

    /// Rebuilds `LOADED` tiles from every file of a style's disk cache.
    ///
    /// Blocks while files are decoded; call it from a blocking context.
    pub fn load_cache(&self, style: &str) -> Result<Vec<Arc<Tile>>, EngineError> {
        let registered = self.registered(style)?;
        let rasters = self.ctx.store.preload(style)?;

        let mut tiles = Vec::with_capacity(rasters.len());
        for (coord, raster) in rasters {
            match (registered.factory)(&self.ctx, coord.level, coord.x, coord.y, raster.image) {
                Ok(tile) => tiles.push(tile),
                Err(e) => warn!(style, tile = %coord, error = %e, "Tile factory rejected cached raster"),
            }
        }

        info!(style, tiles = tiles.len(), "Loaded tiles from disk cache");
        Ok(tiles)
    }

    pub fn disk_cache_stats(&self, style: &str) -> Result<DiskCacheStats, EngineError> {
        Ok(self.ctx.store.stats(style)?)
    }

    /// Reads the expiration embedded in a cached tile file.
    pub fn read_expiration(&self, style: &str, id: &str) -> Result<ExpirationField, EngineError> {
        let coord = TileCoord::from_quadkey(id)?;
        Ok(self.ctx.store.read_expiration(style, &coord)?)
    }

    /// Cancels background tile work and flushes the expiration index.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> Result<usize, EngineError> {
        self.ctx.shutdown.cancel();
        let written = self.ctx.store.index().shutdown()?;
        info!(styles = written, "Tile engine stopped");
        Ok(written)
    }
}

impl std::fmt::Debug for TileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileEngine")
            .field("cache_dir", &self.config.cache_dir())
            .field("styles", &self.registry.names())
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::CacheOnlyStyle;
    use crate::tile::TileState;
    use crate::time::now_millis;
    use image::Rgba;
    use tempfile::TempDir;

    fn engine(temp: &TempDir) -> TileEngine {
        let engine = TileEngine::start(EngineConfig::new(temp.path())).unwrap();
        engine.register_style(Arc::new(CacheOnlyStyle::new("osm")));
        engine
    }

    fn solid(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(256, 256, Rgba([v, v, v, 255]))
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            TileEngine::start(EngineConfig::new(temp.path())),
            Err(EngineError::NoRuntime(_))
        ));
    }

    #[test]
    fn test_start_sync_owns_runtime() {
        let temp = TempDir::new().unwrap();
        let engine = TileEngine::start_sync(EngineConfig::new(temp.path())).unwrap();
        assert_eq!(engine.block_on(async { 7 }).unwrap(), 7);
        engine.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_block_on_requires_owned_runtime() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        assert!(matches!(engine.block_on(async {}), Err(EngineError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_unknown_style_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        assert!(matches!(
            engine.request_tile("satellite", "0"),
            Err(EngineError::UnknownStyle(name)) if name == "satellite"
        ));
        assert!(matches!(engine.load_cache("satellite"), Err(EngineError::UnknownStyle(_))));
    }

    #[tokio::test]
    async fn test_cache_only_style_serves_disk() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let coord = TileCoord::from_quadkey("30").unwrap();
        engine
            .store()
            .save("osm", &coord, &solid(40), now_millis() + 60_000)
            .unwrap();

        let tile = engine.request_tile("osm", "30").unwrap();
        assert_eq!(tile.resolved().await, TileState::Loaded);

        let missing = engine.request_tile("osm", "31").unwrap();
        assert_eq!(missing.resolved().await, TileState::Error);
        assert!(missing.last_error_message().contains("cached tiles only"));
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        for id in ["0", "1", "23"] {
            let coord = TileCoord::from_quadkey(id).unwrap();
            engine.store().save("osm", &coord, &solid(1), now_millis() + 1000).unwrap();
        }
        assert_eq!(engine.disk_cache_stats("osm").unwrap().tiles, 3);

        let cleared = engine.clear_disk_cache("osm").await.unwrap().unwrap();
        assert_eq!(cleared.files_deleted, 3);
        assert_eq!(engine.disk_cache_stats("osm").unwrap().tiles, 0);
    }

    #[tokio::test]
    async fn test_read_expiration() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        let coord = TileCoord::from_quadkey("12").unwrap();
        engine.store().save("osm", &coord, &solid(1), 1_234_567).unwrap();

        assert_eq!(
            engine.read_expiration("osm", "12").unwrap(),
            ExpirationField::At(1_234_567)
        );
        assert!(matches!(
            engine.read_expiration("osm", "13"),
            Err(EngineError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_loaded_indexes() {
        let temp = TempDir::new().unwrap();
        let engine = engine(&temp);
        engine.set_cache("osm", true);
        let coord = TileCoord::from_quadkey("2").unwrap();
        engine.store().save("osm", &coord, &solid(1), now_millis() + 1000).unwrap();

        assert_eq!(engine.shutdown().unwrap(), 1);
        assert!(temp.path().join("serializedCaches/osm").exists());
        assert!(engine.context().shutdown.is_cancelled());
    }
}
