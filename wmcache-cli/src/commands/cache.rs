//! Cache management CLI commands.

use std::sync::Arc;

use clap::Subcommand;
use tracing::info;
use wmcache::cache::{ExpirationField, StoreError};
use wmcache::engine::{EngineError, TileEngine};
use wmcache::style::CacheOnlyStyle;
use wmcache::time::{format_millis, now_millis};

use super::GlobalOptions;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show tile count and disk usage of a style
    Stats {
        /// Map style name
        #[arg(long)]
        style: String,
    },
    /// Delete every cached tile of a style
    Clear {
        /// Map style name
        #[arg(long)]
        style: String,
    },
    /// Decode every cached tile of a style, removing unreadable files
    Preload {
        /// Map style name
        #[arg(long)]
        style: String,
    },
    /// Show the expiration embedded in one cached tile
    Expiry {
        /// Map style name
        #[arg(long)]
        style: String,
        /// Tile quadkey
        id: String,
    },
}

/// Run a cache subcommand.
pub fn run(options: &GlobalOptions, action: CacheAction) -> Result<(), CliError> {
    info!(?action, "Running cache command");
    let engine = options.start_engine()?;
    println!("Disk cache: {}", engine.config().cache_dir().display());

    let result = match action {
        CacheAction::Stats { style } => stats(&engine, &style),
        CacheAction::Clear { style } => clear(&engine, &style),
        CacheAction::Preload { style } => preload(&engine, &style),
        CacheAction::Expiry { style, id } => expiry(&engine, &style, &id),
    };

    engine.shutdown()?;
    result
}

fn stats(engine: &TileEngine, style: &str) -> Result<(), CliError> {
    let stats = engine.disk_cache_stats(style)?;
    println!("Style '{}': {}", style, stats);
    Ok(())
}

fn clear(engine: &TileEngine, style: &str) -> Result<(), CliError> {
    // Loaded so the wiped entries are also dropped from the persisted index.
    engine.set_cache(style, true);

    println!("Clearing style '{}'...", style);
    let result = engine
        .block_on(engine.clear_disk_cache(style))?
        .map_err(EngineError::Join)??;
    println!("{}", result);
    Ok(())
}

fn preload(engine: &TileEngine, style: &str) -> Result<(), CliError> {
    engine.register_style(Arc::new(CacheOnlyStyle::new(style)));
    let tiles = engine.load_cache(style)?;

    let mut per_level = [0usize; wmcache::LEVEL_MAX as usize + 1];
    for tile in &tiles {
        per_level[tile.level() as usize] += 1;
    }

    println!("Loaded {} tiles of style '{}'", tiles.len(), style);
    for (level, count) in per_level.iter().enumerate().filter(|(_, c)| **c > 0) {
        println!("  z{:<2} {}", level, count);
    }
    Ok(())
}

fn expiry(engine: &TileEngine, style: &str, id: &str) -> Result<(), CliError> {
    let field = match engine.read_expiration(style, id) {
        Ok(field) => field,
        Err(EngineError::Store(StoreError::NotFound(_))) => {
            return Err(CliError::TileNotCached {
                style: style.to_string(),
                id: id.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    match field {
        ExpirationField::At(millis) => {
            let status = if millis > now_millis() { "valid" } else { "expired" };
            println!("Tile '{}' expires {} ({})", id, format_millis(millis), status);
        }
        ExpirationField::Missing => println!("Tile '{}' has no expiration (always refetched)", id),
        ExpirationField::Unparseable(raw) => {
            println!("Tile '{}' has an unreadable expiration '{}' (always refetched)", id, raw)
        }
    }
    Ok(())
}
