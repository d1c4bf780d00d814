//! Map tiles and their lifecycle.
//!
//! A [`Tile`] is either built from a raster already in memory (and is
//! `LOADED` from the start) or requested by quadkey, in which case it starts
//! `LOADING` and resolves in the background: first from the disk cache, then
//! through its style's `generate` capability. Painting never blocks; until
//! the tile's own image arrives it paints a cropped ancestor found on disk.
//!
//! State and image are updated together under one lock, and a tile holds an
//! image only while it is `LOADED`. State changes are published on a
//! [`tokio::sync::watch`] channel. At most one resolution runs per tile.

mod context;
mod fallback;
mod paint;
mod state;

pub use context::{FallbackSettings, TileContext, TileSettings};
pub use fallback::{build_placeholder, crop_region, CropRegion};
pub use paint::{
    CanvasLabel, PixmapCanvas, TileCanvas, Viewport, STATUS_LABEL_COLOR, TILE_ID_LABEL_COLOR,
};
pub use state::TileState;

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::codec::is_opaque;
use crate::cache::StoreError;
use crate::coord::{CoordError, TileCoord};
use crate::style::MapStyle;
use crate::time::{add_duration, now_millis};

use fallback::{Fallback, FallbackTask};

/// Errors creating a tile.
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// The requested level is deeper than the style serves.
    #[error("Level {level} exceeds the maximum level {max} of style '{style}'")]
    LevelTooDeep { style: String, level: u8, max: u8 },
}

struct TileInner {
    state: TileState,
    image: Option<Arc<RgbaImage>>,
    expiration: Option<i64>,
    last_error_message: Option<String>,
    transparency_detected: bool,
    fallback: Option<Fallback>,
}

/// One square raster of the quadtree pyramid.
pub struct Tile {
    id: String,
    coord: TileCoord,
    world_x: i64,
    world_y: i64,
    style: Arc<dyn MapStyle>,
    ctx: Arc<TileContext>,
    inner: Mutex<TileInner>,
    state_tx: watch::Sender<TileState>,
    resolving_tx: watch::Sender<bool>,
    last_paint: AtomicI64,
    show_tile_id: AtomicBool,
    fetching_fallback: AtomicBool,
    fallback_task: Mutex<Option<FallbackTask>>,
}

impl Tile {
    fn build(
        ctx: &Arc<TileContext>,
        style: Arc<dyn MapStyle>,
        coord: TileCoord,
        state: TileState,
        image: Option<RgbaImage>,
    ) -> Self {
        let (world_x, world_y) = coord.world_origin();
        let transparency_detected = image
            .as_ref()
            .is_some_and(|image| style.is_base_or_layer() && !is_opaque(image));

        Self {
            id: coord.quadkey(),
            coord,
            world_x,
            world_y,
            style,
            ctx: Arc::clone(ctx),
            inner: Mutex::new(TileInner {
                state,
                image: image.map(Arc::new),
                expiration: None,
                last_error_message: None,
                transparency_detected,
                fallback: None,
            }),
            state_tx: watch::Sender::new(state),
            resolving_tx: watch::Sender::new(false),
            last_paint: AtomicI64::new(now_millis()),
            show_tile_id: AtomicBool::new(false),
            fetching_fallback: AtomicBool::new(false),
            fallback_task: Mutex::new(None),
        }
    }

    /// Creates a `LOADED` tile from a raster already in memory.
    pub fn from_raster(
        ctx: &Arc<TileContext>,
        style: Arc<dyn MapStyle>,
        level: u8,
        x: u32,
        y: u32,
        raster: RgbaImage,
    ) -> Result<Arc<Self>, CoordError> {
        let coord = TileCoord::new(level, x, y)?;
        Ok(Arc::new(Self::build(
            ctx,
            style,
            coord,
            TileState::Loaded,
            Some(raster),
        )))
    }

    /// Creates a tile from its quadkey and starts resolving it.
    ///
    /// The tile is returned `LOADING`; resolution runs on the context's
    /// runtime.
    pub fn request(
        ctx: &Arc<TileContext>,
        style: Arc<dyn MapStyle>,
        id: &str,
    ) -> Result<Arc<Self>, TileError> {
        let coord = TileCoord::from_quadkey(id)?;
        let max = style.max_level_of_detail();
        if coord.level > max {
            return Err(TileError::LevelTooDeep {
                style: style.name().to_string(),
                level: coord.level,
                max,
            });
        }

        let tile = Arc::new(Self::build(ctx, style, coord, TileState::Loading, None));
        tile.load_or_generate();
        Ok(tile)
    }

    /// Quadkey of this tile.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn level(&self) -> u8 {
        self.coord.level
    }

    /// Pixel-space origin of the tile.
    pub fn world_origin(&self) -> (i64, i64) {
        (self.world_x, self.world_y)
    }

    pub fn style(&self) -> &Arc<dyn MapStyle> {
        &self.style
    }

    pub fn state(&self) -> TileState {
        self.inner.lock().state
    }

    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.inner.lock().image.clone()
    }

    /// Expiration in epoch milliseconds, once known.
    pub fn expiration(&self) -> Option<i64> {
        self.inner.lock().expiration
    }

    /// Human-readable cause of the last failure, empty if none.
    pub fn last_error_message(&self) -> String {
        self.inner.lock().last_error_message.clone().unwrap_or_default()
    }

    /// Whether the tile's own raster carries transparency.
    pub fn transparency_detected(&self) -> bool {
        self.inner.lock().transparency_detected
    }

    pub fn last_paint_millis(&self) -> i64 {
        self.last_paint.load(Ordering::Relaxed)
    }

    pub fn show_tile_id(&self) -> bool {
        self.show_tile_id.load(Ordering::Relaxed)
    }

    pub fn set_show_tile_id(&self, show: bool) {
        self.show_tile_id.store(show, Ordering::Relaxed);
    }

    /// Level of the ancestor currently used as placeholder.
    pub fn fallback_level(&self) -> Option<u8> {
        self.inner.lock().fallback.as_ref().map(|f| f.level)
    }

    /// Placeholder raster painted while the tile has no image.
    pub fn fallback_image(&self) -> Option<Arc<RgbaImage>> {
        self.inner.lock().fallback.as_ref().map(|f| Arc::clone(&f.image))
    }

    /// Watches state changes.
    pub fn subscribe(&self) -> watch::Receiver<TileState> {
        self.state_tx.subscribe()
    }

    /// Waits for any in-flight resolution to finish and returns the state.
    pub async fn resolved(&self) -> TileState {
        let mut resolving = self.resolving_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = resolving.wait_for(|busy| !*busy).await;
        self.state()
    }

    /// Sets the state unless the tile is `DISPOSING` or `FATAL_ERROR`.
    ///
    /// Those two states only ever move to `DISPOSING`. Leaving `LOADED`
    /// drops the image. Returns whether the state was written.
    pub fn set_state(&self, next: TileState) -> bool {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, next)
    }

    fn transition(&self, inner: &mut TileInner, next: TileState) -> bool {
        if !inner.state.accepts(next) {
            return false;
        }
        inner.state = next;
        if next != TileState::Loaded {
            inner.image = None;
        }
        self.state_tx.send_replace(next);
        true
    }

    /// Re-runs resolution for a tile in `ERROR`.
    ///
    /// No-op in any other state, and while an earlier resolution is still
    /// running (a disk miss reports `ERROR` before generation starts).
    pub fn retry_loading_tile(self: &Arc<Self>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state != TileState::Error || *self.resolving_tx.borrow() {
                return false;
            }
            self.resolving_tx.send_replace(true);
            self.transition(&mut inner, TileState::Loading);
        }
        debug!(tile = %self.id, style = self.style.name(), "Retrying tile");
        self.load_or_generate();
        true
    }

    /// Moves the tile to `DISPOSING` and cancels its background work.
    ///
    /// Work already running finishes, but its result is discarded.
    pub fn dispose(&self) {
        {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, TileState::Disposing);
            inner.fallback = None;
        }
        if let Some(task) = self.fallback_task.lock().take() {
            task.token.cancel();
        }
    }

    fn touch(&self) {
        self.last_paint.store(now_millis(), Ordering::Relaxed);
    }

    /// Launches disk load, then generation on a cache miss, in the background.
    fn load_or_generate(self: &Arc<Self>) {
        self.touch();
        self.resolving_tx.send_replace(true);

        let tile = Arc::clone(self);
        let permits = Arc::clone(&self.ctx.resolve_permits);
        let shutdown = self.ctx.shutdown.clone();

        self.ctx.runtime.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };

            if permit.is_some() {
                let worker = Arc::clone(&tile);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.resolve()).await {
                    warn!(tile = %tile.id, error = %e, "Tile resolve task failed");
                    let mut inner = tile.inner.lock();
                    inner.last_error_message = Some(format!("Tile resolve task failed: {}", e));
                    if inner.image.is_none() {
                        tile.transition(&mut inner, TileState::Error);
                    }
                }
            }
            drop(permit);
            tile.resolving_tx.send_replace(false);
        });
    }

    fn resolve(self: &Arc<Self>) {
        if self.state().is_terminal() {
            return;
        }

        match self.load_tile() {
            Ok(()) => return,
            Err(e) => {
                debug!(tile = %self.id, style = self.style.name(), reason = %e, "Disk cache miss");
            }
        }

        if self.ctx.settings.fallback.enabled && self.image().is_none() {
            self.search_fallback();
        }
        self.generate_tile();
    }

    /// Loads the tile's raster from the disk cache.
    ///
    /// On failure the tile enters `ERROR` unless it already holds an image.
    /// A successful read on a tile that has since been disposed is dropped.
    pub fn load_tile(&self) -> Result<(), StoreError> {
        let result = self
            .ctx
            .store
            .load(self.style.name(), &self.coord, now_millis());

        let mut inner = self.inner.lock();
        match result {
            Ok(loaded) => {
                if !inner.state.accepts(TileState::Loaded) {
                    debug!(tile = %self.id, state = %inner.state, "Discarding loaded raster");
                    return Ok(());
                }
                inner.transparency_detected =
                    self.style.is_base_or_layer() && loaded.raster.has_alpha;
                inner.image = Some(Arc::new(loaded.raster.image));
                inner.expiration = loaded.expiration;
                inner.fallback = None;
                inner.last_error_message = None;
                self.transition(&mut inner, TileState::Loaded);
                Ok(())
            }
            Err(e) => {
                inner.last_error_message = Some(format!("Error loading tile from file: {}", e));
                if inner.image.is_none() {
                    self.transition(&mut inner, TileState::Error);
                }
                Err(e)
            }
        }
    }

    fn generate_tile(&self) {
        if self.state().is_terminal() {
            return;
        }

        match self.style.generate(&self.coord) {
            Ok(generated) => {
                let expiration = generated
                    .expiration
                    .unwrap_or_else(|| add_duration(now_millis(), self.ctx.settings.default_ttl));
                {
                    let mut inner = self.inner.lock();
                    if !inner.state.accepts(TileState::Loaded) {
                        debug!(tile = %self.id, state = %inner.state, "Discarding generated raster");
                        return;
                    }
                    inner.transparency_detected =
                        self.style.is_base_or_layer() && !is_opaque(&generated.raster);
                    inner.image = Some(Arc::new(generated.raster));
                    inner.expiration = Some(expiration);
                    inner.fallback = None;
                    inner.last_error_message = None;
                    self.transition(&mut inner, TileState::Loaded);
                }
                debug!(tile = %self.id, style = self.style.name(), expiration, "Tile generated");

                if let Err(e) = self.save_tile() {
                    warn!(tile = %self.id, style = self.style.name(), error = %e, "Failed to save tile");
                }
            }
            Err(e) => {
                let next = if e.is_fatal() {
                    TileState::FatalError
                } else {
                    TileState::Error
                };
                debug!(tile = %self.id, style = self.style.name(), error = %e, state = %next, "Tile generation failed");

                let mut inner = self.inner.lock();
                inner.last_error_message = Some(e.to_string());
                if inner.image.is_none() {
                    self.transition(&mut inner, next);
                }
            }
        }
    }

    /// Writes a `LOADED` tile to the disk cache.
    ///
    /// Returns `Ok(false)` without writing in any other state. A tile with no
    /// expiration yet is given the default time-to-live.
    pub fn save_tile(&self) -> Result<bool, StoreError> {
        let (image, expiration) = {
            let mut inner = self.inner.lock();
            if inner.state != TileState::Loaded {
                return Ok(false);
            }
            let Some(image) = inner.image.clone() else {
                warn!(tile = %self.id, "Loaded tile has no image");
                return Ok(false);
            };
            let ttl = self.ctx.settings.default_ttl;
            let expiration = *inner
                .expiration
                .get_or_insert_with(|| add_duration(now_millis(), ttl));
            (image, expiration)
        };

        self.ctx
            .store
            .save(self.style.name(), &self.coord, &image, expiration)?;
        Ok(true)
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("style", &self.style.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use image::Rgba;
    use tempfile::TempDir;
    use tokio::runtime::Handle;

    use super::*;
    use crate::cache::{DiskStore, ExpirationIndex, PngCodec};
    use crate::style::{GenerateError, GeneratedRaster};

    /// Style whose generation outcome is fixed by the test.
    pub struct ScriptedStyle {
        pub name: String,
        pub outcome: Mutex<Result<GeneratedRaster, GenerateError>>,
        pub calls: AtomicUsize,
        pub max_level: u8,
        pub generate_delay: Duration,
    }

    impl ScriptedStyle {
        pub fn succeeding(name: &str, value: u8) -> Arc<Self> {
            Self::with_outcome(name, Ok(GeneratedRaster::new(solid(value))))
        }

        pub fn failing(name: &str, error: GenerateError) -> Arc<Self> {
            Self::with_outcome(name, Err(error))
        }

        fn with_outcome(name: &str, outcome: Result<GeneratedRaster, GenerateError>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                outcome: Mutex::new(outcome),
                calls: AtomicUsize::new(0),
                max_level: crate::coord::LEVEL_MAX,
                generate_delay: Duration::ZERO,
            })
        }

        pub fn set_outcome(&self, outcome: Result<GeneratedRaster, GenerateError>) {
            *self.outcome.lock() = outcome;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MapStyle for ScriptedStyle {
        fn name(&self) -> &str {
            &self.name
        }

        fn max_level_of_detail(&self) -> u8 {
            self.max_level
        }

        fn generate(&self, _coord: &TileCoord) -> Result<GeneratedRaster, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.generate_delay);
            self.outcome.lock().clone()
        }
    }

    pub fn solid(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(256, 256, Rgba([value, value, value, 255]))
    }

    pub fn context(temp: &TempDir, settings: TileSettings) -> Arc<TileContext> {
        let index = Arc::new(ExpirationIndex::new(
            temp.path(),
            Duration::from_secs(3600),
            Handle::current(),
        ));
        let store = Arc::new(DiskStore::new(Arc::new(PngCodec::new()), index));
        Arc::new(TileContext::new(store, Handle::current(), settings))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::style::{GenerateError, GeneratedRaster};
    use image::Rgba;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quiet_settings() -> TileSettings {
        let mut settings = TileSettings::default();
        settings.fallback.enabled = false;
        settings
    }

    #[tokio::test]
    async fn test_from_raster_is_loaded() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let style = ScriptedStyle::succeeding("osm", 1);

        let tile = Tile::from_raster(&ctx, style, 4, 5, 3, solid(9)).unwrap();
        assert_eq!(tile.state(), TileState::Loaded);
        assert!(tile.image().is_some());
        assert_eq!(tile.id(), "0123");
        assert_eq!(tile.world_origin(), (1280, 768));
        assert!(!tile.transparency_detected());
    }

    #[tokio::test]
    async fn test_from_raster_detects_alpha_on_base_layers() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let raster = RgbaImage::from_pixel(256, 256, Rgba([1, 2, 3, 10]));

        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 0, 0, 0, raster.clone())
            .unwrap();
        assert!(tile.transparency_detected());

        let overlay = Arc::new(crate::style::CacheOnlyStyle::overlay("marks"));
        let tile = Tile::from_raster(&ctx, overlay, 0, 0, 0, raster).unwrap();
        assert!(!tile.transparency_detected());
    }

    #[tokio::test]
    async fn test_request_generates_and_saves() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let style = ScriptedStyle::succeeding("osm", 77);

        let tile = Tile::request(&ctx, style.clone(), "0123").unwrap();
        assert_eq!(tile.resolved().await, TileState::Loaded);
        assert_eq!(style.calls(), 1);
        assert!(tile.last_error_message().is_empty());
        assert!(temp.path().join("osm/z4/x5/y3.png").exists());
        assert!(tile.expiration().unwrap() > now_millis());
    }

    #[tokio::test]
    async fn test_request_prefers_disk_cache() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let coord = TileCoord::from_quadkey("21").unwrap();
        ctx.store
            .save("osm", &coord, &solid(5), now_millis() + 60_000)
            .unwrap();

        let style = ScriptedStyle::succeeding("osm", 200);
        let tile = Tile::request(&ctx, style.clone(), "21").unwrap();
        assert_eq!(tile.resolved().await, TileState::Loaded);
        assert_eq!(style.calls(), 0);
        assert_eq!(tile.image().unwrap().get_pixel(0, 0)[0], 5);
    }

    #[tokio::test]
    async fn test_failed_generation_is_error_then_retry_recovers() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let style = ScriptedStyle::failing("osm", GenerateError::Failed("offline".into()));

        let tile = Tile::request(&ctx, style.clone(), "1").unwrap();
        assert_eq!(tile.resolved().await, TileState::Error);
        assert_eq!(tile.last_error_message(), "offline");

        style.set_outcome(Ok(GeneratedRaster::new(solid(3))));
        assert!(tile.retry_loading_tile());
        assert_eq!(tile.resolved().await, TileState::Loaded);
        assert_eq!(style.calls(), 2);

        // Retry is a no-op outside ERROR.
        assert!(!tile.retry_loading_tile());
        assert_eq!(tile.state(), TileState::Loaded);
    }

    #[tokio::test]
    async fn test_retry_rejected_while_generation_in_flight() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let mut scripted = Arc::into_inner(ScriptedStyle::succeeding("osm", 4)).unwrap();
        scripted.generate_delay = Duration::from_millis(300);
        let style = Arc::new(scripted);

        let tile = Tile::request(&ctx, style.clone(), "0123").unwrap();
        // The disk miss reports ERROR before the slow generation finishes.
        let mut states = tile.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|state| *state == TileState::Error),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!tile.retry_loading_tile());
        assert_eq!(tile.resolved().await, TileState::Loaded);
        assert_eq!(style.calls(), 1);
        assert!(tile.image().is_some());
    }

    #[tokio::test]
    async fn test_leaving_loaded_drops_image() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 2, 1, 1, solid(8)).unwrap();
        assert!(tile.image().is_some());

        assert!(tile.set_state(TileState::Error));
        assert!(tile.image().is_none());
        assert!(!tile.save_tile().unwrap());
    }

    #[tokio::test]
    async fn test_fatal_generation_is_sticky() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let style = ScriptedStyle::failing("osm", GenerateError::Fatal("gone".into()));

        let tile = Tile::request(&ctx, style.clone(), "3").unwrap();
        assert_eq!(tile.resolved().await, TileState::FatalError);

        assert!(!tile.retry_loading_tile());
        for next in [TileState::Loading, TileState::Error, TileState::Loaded] {
            assert!(!tile.set_state(next));
            assert_eq!(tile.state(), TileState::FatalError);
        }
        assert!(tile.set_state(TileState::Disposing));
        assert!(!tile.set_state(TileState::Loading));
        assert_eq!(tile.state(), TileState::Disposing);
        assert_eq!(style.calls(), 1);
    }

    #[tokio::test]
    async fn test_level_above_style_max_rejected() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let mut scripted = Arc::into_inner(ScriptedStyle::succeeding("osm", 1)).unwrap();
        scripted.max_level = 2;
        let style = Arc::new(scripted);

        assert!(matches!(
            Tile::request(&ctx, style.clone(), "012"),
            Err(TileError::LevelTooDeep { level: 3, max: 2, .. })
        ));
        assert!(Tile::request(&ctx, style, "01").is_ok());
        assert!(matches!(
            Tile::request(&ctx, ScriptedStyle::succeeding("osm", 1), "0x"),
            Err(TileError::Coord(_))
        ));
    }

    #[tokio::test]
    async fn test_dispose_discards_image_and_blocks_states() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 1, 0, 0, solid(1)).unwrap();

        tile.dispose();
        assert_eq!(tile.state(), TileState::Disposing);
        assert!(tile.image().is_none());
        assert!(!tile.set_state(TileState::Loaded));
        assert!(!tile.save_tile().unwrap());
    }

    #[tokio::test]
    async fn test_save_tile_requires_loaded() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 1, 1, 0, solid(1)).unwrap();

        assert!(tile.save_tile().unwrap());
        let expiration = tile.expiration().unwrap();
        assert_eq!(ctx.store.index().get("osm", "1"), Some(expiration));

        tile.set_state(TileState::Error);
        assert!(!tile.save_tile().unwrap());
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, quiet_settings());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 0, 0, 0, solid(1)).unwrap();

        let rx = tile.subscribe();
        assert_eq!(*rx.borrow(), TileState::Loaded);
        tile.set_state(TileState::Error);
        assert_eq!(*rx.borrow(), TileState::Error);
    }
}
