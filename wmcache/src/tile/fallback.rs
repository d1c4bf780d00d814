//! Placeholder rendering from coarser ancestors.
//!
//! While a tile has no image, its nearest ancestor present on disk is
//! cropped to the region the tile covers and scaled back up to a full tile.
//! A periodic per-tile task keeps looking for a closer ancestor until the
//! tile loads, is disposed, stops being painted, or holds its parent's crop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{FallbackSettings, Tile, TileState};
use crate::coord::TILE_SIZE;
use crate::time::now_millis;

/// Square region of an ancestor raster covering a descendant tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Region of an ancestor of width `ancestor_size` covered by the descendant
/// reached through `digits`.
///
/// Each digit picks a quadrant of the region selected so far (0 top-left,
/// 1 top-right, 2 bottom-left, 3 bottom-right). Returns `None` for an empty
/// path, a non-quadkey digit, or a crop smaller than one pixel.
///
/// # Example
///
/// ```
/// use wmcache::tile::{crop_region, CropRegion};
///
/// // Bottom-right quadrant, then its top-right quadrant.
/// assert_eq!(
///     crop_region("31", 256),
///     Some(CropRegion { x: 192, y: 128, size: 64 })
/// );
/// ```
pub fn crop_region(digits: &str, ancestor_size: u32) -> Option<CropRegion> {
    let depth = digits.len();
    if depth == 0 || depth >= 32 {
        return None;
    }
    let size = ancestor_size >> depth;
    if size == 0 {
        return None;
    }

    let (mut x, mut y) = (0u32, 0u32);
    for (i, digit) in digits.bytes().enumerate() {
        let half = ancestor_size >> (i + 1);
        match digit {
            b'0' => {}
            b'1' => x += half,
            b'2' => y += half,
            b'3' => {
                x += half;
                y += half;
            }
            _ => return None,
        }
    }
    Some(CropRegion { x, y, size })
}

/// Crops the region of `ancestor` selected by `digits` and upscales it to
/// the standard tile footprint.
pub fn build_placeholder(ancestor: &RgbaImage, digits: &str) -> Option<RgbaImage> {
    let region = crop_region(digits, ancestor.width())?;
    if region.x + region.size > ancestor.width() || region.y + region.size > ancestor.height() {
        return None;
    }

    let crop = imageops::crop_imm(ancestor, region.x, region.y, region.size, region.size).to_image();
    Some(imageops::resize(
        &crop,
        TILE_SIZE,
        TILE_SIZE,
        FilterType::Triangle,
    ))
}

/// Placeholder held by a tile.
#[derive(Clone)]
pub(super) struct Fallback {
    pub(super) image: Arc<RgbaImage>,
    /// Level of the ancestor it was cropped from.
    pub(super) level: u8,
}

/// Handle on a tile's periodic search.
pub(super) struct FallbackTask {
    pub(super) token: CancellationToken,
    pub(super) handle: JoinHandle<()>,
}

/// Clears the in-progress flag when a search ends.
struct SearchGuard<'a>(&'a AtomicBool);

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Tile {
    /// Looks for the nearest ancestor on disk and installs its crop as the
    /// placeholder.
    ///
    /// Ancestors are tried from the parent upwards; the search stops early
    /// when it reaches the level already held. Returns the level installed.
    pub(super) fn search_fallback(&self) -> Option<u8> {
        if self.fetching_fallback.swap(true, Ordering::AcqRel) {
            return None;
        }
        let _guard = SearchGuard(&self.fetching_fallback);

        let level = self.coord.level;
        let current = self.fallback_level();
        if level == 0 || current == Some(level - 1) {
            return None;
        }

        let max_cuts = self.ctx.settings.fallback.max_cuts.min(level);
        for cuts in 1..=max_cuts {
            let ancestor_level = level - cuts;
            if current == Some(ancestor_level) {
                return None;
            }
            let Some(ancestor) = self.coord.ancestor(cuts) else {
                break;
            };
            let Some(decoded) = self.ctx.store.read_ancestor(self.style.name(), &ancestor) else {
                continue;
            };

            let digits = &self.id[ancestor_level as usize..];
            let Some(placeholder) = build_placeholder(&decoded.image, digits) else {
                continue;
            };

            let mut inner = self.inner.lock();
            if inner.image.is_some() || inner.state == TileState::Disposing {
                return None;
            }
            inner.fallback = Some(Fallback {
                image: Arc::new(placeholder),
                level: ancestor_level,
            });
            debug!(tile = %self.id, style = self.style.name(), ancestor_level, "Fallback placeholder installed");
            return Some(ancestor_level);
        }
        None
    }

    /// Starts the periodic fallback search unless one is already running or
    /// cannot improve on the current placeholder.
    pub(super) fn schedule_fallback_search(self: &Arc<Self>) {
        let settings = &self.ctx.settings.fallback;
        let level = self.coord.level;
        if !settings.enabled || level == 0 || self.ctx.shutdown.is_cancelled() {
            return;
        }
        if self.state() == TileState::Disposing || self.fallback_level() == Some(level - 1) {
            return;
        }

        let mut task = self.fallback_task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let token = self.ctx.shutdown.child_token();
        let handle = self.ctx.runtime.spawn(run_fallback_search(
            Arc::downgrade(self),
            token.clone(),
            settings.clone(),
        ));
        *task = Some(FallbackTask { token, handle });
        debug!(tile = %self.id, style = self.style.name(), "Fallback search scheduled");
    }

    /// Whether the periodic search has nothing left to do.
    fn fallback_search_done(&self, staleness: Duration) -> bool {
        let inner = self.inner.lock();
        if inner.state == TileState::Disposing || inner.image.is_some() {
            return true;
        }
        if inner
            .fallback
            .as_ref()
            .is_some_and(|f| f.level + 1 == self.coord.level)
        {
            return true;
        }
        drop(inner);

        let idle = now_millis().saturating_sub(self.last_paint_millis());
        idle > i64::try_from(staleness.as_millis()).unwrap_or(i64::MAX)
    }

    /// Whether a periodic search task is currently running.
    pub fn is_fallback_search_running(&self) -> bool {
        self.fallback_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

async fn run_fallback_search(
    tile: Weak<Tile>,
    token: CancellationToken,
    settings: FallbackSettings,
) {
    let period = settings.interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now() + settings.initial_delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            _ = interval.tick() => {
                let Some(tile) = tile.upgrade() else {
                    break;
                };
                let worker = Arc::clone(&tile);
                if tokio::task::spawn_blocking(move || worker.search_fallback()).await.is_err() {
                    break;
                }
                if tile.fallback_search_done(settings.staleness) {
                    debug!(tile = %tile.id, "Fallback search finished");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::tile::test_support::*;
    use crate::tile::{PixmapCanvas, TileSettings, Viewport};
    use crate::time::now_millis;
    use image::Rgba;
    use tempfile::TempDir;

    /// 256x256 raster with a distinct colour in each 64x64 cell.
    fn grid() -> RgbaImage {
        RgbaImage::from_fn(256, 256, |x, y| Rgba([(x / 64 * 60) as u8, (y / 64 * 60) as u8, 0, 255]))
    }

    #[test]
    fn test_crop_region_single_digit() {
        assert_eq!(crop_region("0", 256), Some(CropRegion { x: 0, y: 0, size: 128 }));
        assert_eq!(crop_region("1", 256), Some(CropRegion { x: 128, y: 0, size: 128 }));
        assert_eq!(crop_region("2", 256), Some(CropRegion { x: 0, y: 128, size: 128 }));
        assert_eq!(crop_region("3", 256), Some(CropRegion { x: 128, y: 128, size: 128 }));
    }

    #[test]
    fn test_crop_region_two_digits() {
        // Digits are applied most significant first: "3" picks the
        // bottom-right quadrant, "1" its top-right sub-quadrant.
        assert_eq!(crop_region("31", 256), Some(CropRegion { x: 192, y: 128, size: 64 }));
        assert_eq!(crop_region("13", 256), Some(CropRegion { x: 192, y: 64, size: 64 }));
    }

    #[test]
    fn test_crop_region_limits() {
        assert_eq!(crop_region("", 256), None);
        assert_eq!(crop_region("4", 256), None);
        assert_eq!(crop_region("000000000", 256), None);
        assert_eq!(crop_region("33333333", 256), Some(CropRegion { x: 255, y: 255, size: 1 }));
    }

    #[test]
    fn test_build_placeholder_upscales_crop() {
        let placeholder = build_placeholder(&grid(), "31").unwrap();
        assert_eq!(placeholder.dimensions(), (256, 256));
        // Crop (192..256, 128..192) is one grid cell: x cell 3, y cell 2.
        assert_eq!(placeholder.get_pixel(128, 128), &Rgba([180, 120, 0, 255]));
        assert_eq!(placeholder.get_pixel(5, 250), &Rgba([180, 120, 0, 255]));
    }

    #[test]
    fn test_build_placeholder_small_ancestor() {
        let small = RgbaImage::from_pixel(64, 64, Rgba([9, 9, 9, 255]));
        let placeholder = build_placeholder(&small, "2").unwrap();
        assert_eq!(placeholder.dimensions(), (256, 256));
    }

    fn settings() -> TileSettings {
        let mut settings = TileSettings::default();
        settings.fallback.initial_delay = Duration::from_millis(10);
        settings.fallback.interval = Duration::from_millis(20);
        settings
    }

    #[tokio::test]
    async fn test_search_uses_nearest_ancestor() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, settings());
        let far = TileCoord::from_quadkey("0").unwrap();
        let near = TileCoord::from_quadkey("012").unwrap();
        ctx.store.save("osm", &far, &grid(), now_millis() - 1).unwrap();
        ctx.store.save("osm", &near, &grid(), now_millis() - 1).unwrap();

        let tile = Tile::request(&ctx, ScriptedStyle::failing("osm", crate::style::GenerateError::Failed("x".into())), "01231").unwrap();
        tile.resolved().await;

        // Resolution runs one search after the failed disk load.
        assert_eq!(tile.fallback_level(), Some(3));
        assert!(tile.fallback_image().is_some());
    }

    #[tokio::test]
    async fn test_search_skips_unreadable_ancestor_without_deleting() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, settings());
        let root = TileCoord::from_quadkey("2").unwrap();
        ctx.store.save("osm", &root, &grid(), now_millis() + 60_000).unwrap();
        let parent = ctx.store.tile_path("osm", &TileCoord::from_quadkey("21").unwrap());
        std::fs::create_dir_all(parent.parent().unwrap()).unwrap();
        std::fs::write(&parent, b"partial").unwrap();

        let tile = Tile::request(&ctx, ScriptedStyle::failing("osm", crate::style::GenerateError::Failed("x".into())), "213").unwrap();
        tile.resolved().await;

        assert_eq!(tile.fallback_level(), Some(1));
        assert!(parent.exists());
    }

    #[tokio::test]
    async fn test_paint_schedules_search_and_parent_crop_stops_it() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, settings());
        let style = ScriptedStyle::failing("osm", crate::style::GenerateError::Failed("x".into()));

        let tile = Tile::request(&ctx, style, "03").unwrap();
        tile.resolved().await;
        assert_eq!(tile.fallback_level(), None);

        // The parent appears on disk after the first failed attempt.
        let parent = TileCoord::from_quadkey("0").unwrap();
        ctx.store.save("osm", &parent, &grid(), now_millis()).unwrap();

        let mut canvas = PixmapCanvas::new(256, 256).unwrap();
        let viewport = Viewport::new(128.0 + 256.0, 128.0 + 256.0, 256, 256);
        tile.paint(&mut canvas, &viewport, false);
        assert!(tile.is_fallback_search_running());

        for _ in 0..100 {
            if !tile.is_fallback_search_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(tile.fallback_level(), Some(1));
        assert!(!tile.is_fallback_search_running());
    }

    #[tokio::test]
    async fn test_dispose_cancels_search() {
        let temp = TempDir::new().unwrap();
        let mut slow = settings();
        slow.fallback.initial_delay = Duration::from_secs(3600);
        let ctx = context(&temp, slow);
        let style = ScriptedStyle::failing("osm", crate::style::GenerateError::Failed("x".into()));

        let tile = Tile::request(&ctx, style, "12").unwrap();
        tile.resolved().await;
        tile.schedule_fallback_search();
        assert!(tile.is_fallback_search_running());

        tile.dispose();
        for _ in 0..100 {
            if !tile.is_fallback_search_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!tile.is_fallback_search_running());
    }
}
