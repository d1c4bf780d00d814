//! Painting tiles onto a destination surface.
//!
//! Painting only reads already-resolved state; when a placeholder is
//! missing it schedules the background search and returns.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use tiny_skia::{
    BlendMode, ColorU8, FilterQuality, Pixmap, PixmapPaint, Transform,
};

use super::Tile;
use crate::coord::TILE_SIZE;

/// White at alpha 100, for LOADING/RETRYING overlays.
pub const STATUS_LABEL_COLOR: [u8; 4] = [255, 255, 255, 100];

/// Opaque green, for the tile id overlay.
pub const TILE_ID_LABEL_COLOR: [u8; 4] = [0, 255, 0, 255];

/// Offset of overlay labels from the tile origin.
const LABEL_OFFSET: f64 = (TILE_SIZE / 2) as f64;

/// What the map view shows: its centre in world pixels at the current level
/// and its size in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(center_x: f64, center_y: f64, width: u32, height: u32) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Screen position of a world pixel.
    pub fn to_screen(&self, world_x: i64, world_y: i64) -> (f64, f64) {
        (
            f64::from(self.width) / 2.0 + (world_x as f64 - self.center_x),
            f64::from(self.height) / 2.0 + (world_y as f64 - self.center_y),
        )
    }
}

/// Destination surface for tile painting.
pub trait TileCanvas {
    /// Draws `raster` with its top-left corner at `(x, y)`, scaled
    /// uniformly by `scale`.
    fn draw_raster(&mut self, raster: &RgbaImage, x: f64, y: f64, scale: f64, opacity: f32);

    /// Draws a short text overlay anchored at `(x, y)`.
    fn draw_label(&mut self, text: &str, x: f64, y: f64, color: [u8; 4]);
}

impl Tile {
    /// Paints the tile, or its placeholder while it has no image.
    ///
    /// With `use_transparency` the style's transparency is applied, unless
    /// the tile's own raster already carries alpha.
    pub fn paint(self: &Arc<Self>, canvas: &mut dyn TileCanvas, viewport: &Viewport, use_transparency: bool) {
        self.touch();

        let (x, y) = viewport.to_screen(self.world_x, self.world_y);
        let (image, fallback, state, detected) = {
            let inner = self.inner.lock();
            (
                inner.image.clone(),
                inner.fallback.clone(),
                inner.state,
                inner.transparency_detected,
            )
        };
        let opacity = self.paint_opacity(use_transparency, detected);

        if let Some(image) = image {
            canvas.draw_raster(&image, x, y, 1.0, opacity);
            if self.show_tile_id() {
                canvas.draw_label(&self.id, x + LABEL_OFFSET, y + LABEL_OFFSET, TILE_ID_LABEL_COLOR);
            }
            return;
        }

        match fallback {
            Some(fallback) if fallback.image.width() > 0 => {
                let scale = f64::from(TILE_SIZE) / f64::from(fallback.image.width());
                canvas.draw_raster(&fallback.image, x, y, scale, opacity);
            }
            _ => self.schedule_fallback_search(),
        }

        if state.is_pending() {
            canvas.draw_label(state.label(), x + LABEL_OFFSET, y + LABEL_OFFSET, STATUS_LABEL_COLOR);
        }
    }

    fn paint_opacity(&self, use_transparency: bool, detected: bool) -> f32 {
        let transparency = self.style.transparency();
        if use_transparency && !detected && (0.0..1.0).contains(&transparency) {
            transparency
        } else {
            1.0
        }
    }
}

/// A label recorded by [`PixmapCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasLabel {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: [u8; 4],
}

/// Software canvas backed by a `tiny-skia` pixmap.
///
/// Rasters are composited source-over with bilinear filtering. Labels are
/// recorded rather than rasterized.
pub struct PixmapCanvas {
    pixmap: Pixmap,
    labels: Vec<CanvasLabel>,
}

impl PixmapCanvas {
    /// A transparent canvas; `None` for a zero-sized one.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            pixmap: Pixmap::new(width, height)?,
            labels: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn labels(&self) -> &[CanvasLabel] {
        &self.labels
    }

    /// Copies the canvas out as straight-alpha RGBA.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (dst, src) in out.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}

impl TileCanvas for PixmapCanvas {
    fn draw_raster(&mut self, raster: &RgbaImage, x: f64, y: f64, scale: f64, opacity: f32) {
        let Some(source) = raster_to_pixmap(raster) else {
            return;
        };
        let paint = PixmapPaint {
            opacity,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        let transform =
            Transform::from_scale(scale as f32, scale as f32).post_translate(x as f32, y as f32);
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    }

    fn draw_label(&mut self, text: &str, x: f64, y: f64, color: [u8; 4]) {
        self.labels.push(CanvasLabel {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }
}

fn raster_to_pixmap(raster: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(raster.width(), raster.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(raster.pixels()) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::style::{CacheOnlyStyle, GenerateError};
    use crate::tile::test_support::*;
    use crate::tile::{TileSettings, TileState};
    use crate::time::now_millis;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingCanvas {
        rasters: Vec<(u32, f64, f64, f64, f32)>,
        labels: Vec<(String, f64, f64, [u8; 4])>,
    }

    impl TileCanvas for RecordingCanvas {
        fn draw_raster(&mut self, raster: &RgbaImage, x: f64, y: f64, scale: f64, opacity: f32) {
            self.rasters.push((raster.width(), x, y, scale, opacity));
        }

        fn draw_label(&mut self, text: &str, x: f64, y: f64, color: [u8; 4]) {
            self.labels.push((text.to_string(), x, y, color));
        }
    }

    fn viewport() -> Viewport {
        // Centred on world pixel (1280, 768) in an 800x600 view.
        Viewport::new(1280.0, 768.0, 800, 600)
    }

    #[test]
    fn test_viewport_to_screen() {
        assert_eq!(viewport().to_screen(1280, 768), (400.0, 300.0));
        assert_eq!(viewport().to_screen(1024, 768), (144.0, 300.0));
    }

    #[tokio::test]
    async fn test_loaded_tile_paints_with_transparency() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, TileSettings::default());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 4, 5, 3, solid(50)).unwrap();

        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), true);
        assert_eq!(canvas.rasters, vec![(256, 400.0, 300.0, 1.0, 0.4)]);
        assert!(canvas.labels.is_empty());

        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), false);
        assert_eq!(canvas.rasters[0].4, 1.0);
    }

    #[tokio::test]
    async fn test_detected_alpha_skips_extra_transparency() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, TileSettings::default());
        let raster = RgbaImage::from_pixel(256, 256, Rgba([0, 0, 0, 128]));
        let tile = Tile::from_raster(&ctx, Arc::new(CacheOnlyStyle::new("osm")), 4, 5, 3, raster).unwrap();

        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), true);
        assert_eq!(canvas.rasters[0].4, 1.0);
    }

    #[tokio::test]
    async fn test_tile_id_overlay() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, TileSettings::default());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 4, 5, 3, solid(50)).unwrap();
        tile.set_show_tile_id(true);

        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), false);
        assert_eq!(
            canvas.labels,
            vec![("0123".to_string(), 528.0, 428.0, TILE_ID_LABEL_COLOR)]
        );
    }

    #[tokio::test]
    async fn test_pending_tile_paints_status_and_fallback() {
        let temp = TempDir::new().unwrap();
        let mut settings = TileSettings::default();
        settings.fallback.initial_delay = Duration::from_secs(3600);
        let ctx = context(&temp, settings);
        let parent = TileCoord::from_quadkey("012").unwrap();
        ctx.store.save("osm", &parent, &solid(90), now_millis()).unwrap();

        let tile = Tile::request(&ctx, ScriptedStyle::failing("osm", GenerateError::Failed("x".into())), "0123").unwrap();
        tile.resolved().await;
        assert_eq!(tile.fallback_level(), Some(3));

        tile.set_state(TileState::Retrying);
        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), false);
        assert_eq!(canvas.rasters, vec![(256, 400.0, 300.0, 1.0, 1.0)]);
        assert_eq!(
            canvas.labels,
            vec![("RETRYING".to_string(), 528.0, 428.0, STATUS_LABEL_COLOR)]
        );
        // Holding the parent's crop, painting does not start a search.
        assert!(!tile.is_fallback_search_running());
    }

    #[tokio::test]
    async fn test_error_tile_without_fallback_paints_nothing() {
        let temp = TempDir::new().unwrap();
        let mut settings = TileSettings::default();
        settings.fallback.initial_delay = Duration::from_secs(3600);
        let ctx = context(&temp, settings);

        let tile = Tile::request(&ctx, ScriptedStyle::failing("osm", GenerateError::Failed("x".into())), "0").unwrap();
        assert_eq!(tile.resolved().await, TileState::Error);

        let mut canvas = RecordingCanvas::default();
        tile.paint(&mut canvas, &viewport(), false);
        assert!(canvas.rasters.is_empty());
        assert!(canvas.labels.is_empty());
    }

    #[tokio::test]
    async fn test_pixmap_canvas_composites() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, TileSettings::default());
        let tile = Tile::from_raster(&ctx, ScriptedStyle::succeeding("osm", 1), 0, 0, 0, solid(200)).unwrap();

        let mut canvas = PixmapCanvas::new(256, 256).unwrap();
        tile.paint(&mut canvas, &Viewport::new(128.0, 128.0, 256, 256), false);

        let out = canvas.to_rgba_image();
        assert_eq!(out.get_pixel(10, 10), &Rgba([200, 200, 200, 255]));
        assert_eq!(out.get_pixel(255, 255), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn test_pixmap_canvas_records_labels() {
        let mut canvas = PixmapCanvas::new(4, 4).unwrap();
        canvas.draw_label("LOADING", 2.0, 2.0, STATUS_LABEL_COLOR);
        assert_eq!(canvas.labels().len(), 1);
        assert!(PixmapCanvas::new(0, 0).is_none());
    }
}
