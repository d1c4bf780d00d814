//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use wmcache::cache::StoreError;
use wmcache::config::ConfigFileError;
use wmcache::coord::CoordError;
use wmcache::engine::EngineError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or is invalid
    Config(ConfigFileError),
    /// Tile engine could not start
    EngineStart(EngineError),
    /// Invalid tile id
    Quadkey(CoordError),
    /// A cache operation failed
    Cache(EngineError),
    /// The requested tile is not in the cache
    TileNotCached { style: String, id: String },
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Quadkey(_) => {
                eprintln!();
                eprintln!("A tile id is a quadkey: one digit 0-3 per level, e.g. 0123.");
            }
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!(
                    "Check {} or pass --config <path>.",
                    wmcache::config::config_file_path().display()
                );
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::EngineStart(e) => write!(f, "Failed to start tile engine: {}", e),
            CliError::Quadkey(e) => write!(f, "{}", e),
            CliError::Cache(e) => write!(f, "Cache operation failed: {}", e),
            CliError::TileNotCached { style, id } => {
                write!(f, "Tile '{}' of style '{}' is not cached", id, style)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::EngineStart(e) | CliError::Cache(e) => Some(e),
            CliError::Quadkey(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Quadkey(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Coord(e) => CliError::Quadkey(e),
            other => CliError::Cache(other),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Cache(EngineError::Store(e))
    }
}
