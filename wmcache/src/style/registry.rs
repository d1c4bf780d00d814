//! Style registration.
//!
//! Bulk preload rebuilds tiles from files on disk, knowing only the style
//! name. Each style therefore registers a factory that turns
//! `(level, x, y, raster)` into a loaded tile.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::RwLock;

use super::MapStyle;
use crate::coord::CoordError;
use crate::tile::{Tile, TileContext};

/// Builds a loaded tile from a raster read off disk.
pub type TileFactory = Arc<
    dyn Fn(&Arc<TileContext>, u8, u32, u32, RgbaImage) -> Result<Arc<Tile>, CoordError>
        + Send
        + Sync,
>;

/// Factory building a plain [`Tile`] of the given style.
pub fn default_factory(style: Arc<dyn MapStyle>) -> TileFactory {
    Arc::new(
        move |ctx: &Arc<TileContext>, level: u8, x: u32, y: u32, raster: RgbaImage| {
            Tile::from_raster(ctx, Arc::clone(&style), level, x, y, raster)
        },
    )
}

/// A style together with its tile factory.
#[derive(Clone)]
pub struct RegisteredStyle {
    pub style: Arc<dyn MapStyle>,
    pub factory: TileFactory,
}

/// Styles known to an engine, by name.
#[derive(Default)]
pub struct StyleRegistry {
    styles: RwLock<HashMap<String, RegisteredStyle>>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a style with the default factory, replacing any style of
    /// the same name.
    pub fn register(&self, style: Arc<dyn MapStyle>) {
        let factory = default_factory(Arc::clone(&style));
        self.register_with_factory(style, factory);
    }

    /// Registers a style with a custom factory.
    pub fn register_with_factory(&self, style: Arc<dyn MapStyle>, factory: TileFactory) {
        let name = style.name().to_string();
        self.styles
            .write()
            .insert(name, RegisteredStyle { style, factory });
    }

    pub fn get(&self, name: &str) -> Option<RegisteredStyle> {
        self.styles.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.read().contains_key(name)
    }

    /// Registered style names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.styles.read().keys().cloned().collect();
        names.sort();
        names
    }
}
