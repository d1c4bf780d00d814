//! Tile id inspection.

use wmcache::cache::tile_path;
use wmcache::coord::{map_size, TileCoord};

use super::GlobalOptions;
use crate::error::CliError;

/// Print level, column, row and cache location of a quadkey.
pub fn run(options: &GlobalOptions, id: &str, style: Option<&str>) -> Result<(), CliError> {
    let coord = TileCoord::from_quadkey(id)?;
    let (world_x, world_y) = coord.world_origin();

    println!("Tile {}", if id.is_empty() { "(root)" } else { id });
    println!("  Level:        {}", coord.level);
    println!("  Column (x):   {}", coord.x);
    println!("  Row (y):      {}", coord.y);
    println!("  World origin: ({}, {})", world_x, world_y);
    println!("  Map size:     {} px", map_size(coord.level));

    if let Some(style) = style {
        let config = options.load_config()?;
        println!(
            "  Cache file:   {}",
            tile_path(&config.cache.directory, style, &coord, "png").display()
        );
    }
    Ok(())
}
