//! Disk cache for map tiles.
//!
//! - [`codec`]: raster format with an embedded `expiration` text field
//! - [`path`]: `<base>/<style>/z<level>/x<x>/y<y>.<ext>` layout
//! - [`expiration`]: per-style expiration index with debounced persistence
//! - [`store`]: tile load/save/wipe/preload guarded by per-style RW locks
//! - [`bulk`]: directory walking for wipes, preloads and usage reports

pub mod bulk;
pub mod codec;
pub mod expiration;
pub mod path;
pub mod store;

pub use bulk::{ClearResult, DiskCacheStats};
pub use codec::{
    CodecError, DecodedRaster, ExpirationField, PngCodec, TileCodec, EXPIRATION_KEYWORD,
};
pub use expiration::{ExpirationIndex, DEFAULT_SAVE_DELAY};
pub use path::{
    index_path, is_valid_style_name, style_directory, tile_path, SERIALIZED_CACHES_DIR,
};
pub use store::{DiskStore, LoadedTile, StoreError};
