//! wmcache CLI - inspect and maintain a tile cache directory.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wmcache::logging::{default_log_dir, default_log_file, init_logging};

use commands::cache::CacheAction;
use commands::GlobalOptions;
use error::CliError;

#[derive(Parser)]
#[command(name = "wmcache")]
#[command(version = wmcache::VERSION)]
#[command(about = "Quadtree map tile cache administration", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.wmcache/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache base directory, overriding the configuration file
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a quadkey into level, column and row
    Quadkey {
        /// Tile quadkey (digits 0-3)
        id: String,

        /// Also print the cache file path for this style
        #[arg(long)]
        style: Option<String>,
    },
    /// Manage the disk cache of one style
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = GlobalOptions {
        config: cli.config,
        cache_dir: cli.cache_dir,
    };

    match cli.command {
        Commands::Quadkey { id, style } => commands::quadkey::run(&options, &id, style.as_deref()),
        Commands::Cache { action } => {
            let _logging = init_logging(&default_log_dir(), default_log_file())
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;
            commands::cache::run(&options, action)
        }
    }
}
