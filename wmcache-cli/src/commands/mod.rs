//! CLI command implementations.
//!
//! - [`cache`] - per-style disk cache management (stats, clear, preload, expiry)
//! - [`quadkey`] - decode a tile id

pub mod cache;
pub mod quadkey;

use std::path::PathBuf;

use wmcache::config::ConfigFile;
use wmcache::engine::{EngineConfig, TileEngine};

use crate::error::CliError;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

impl GlobalOptions {
    /// Loads the configuration file, applying command-line overrides.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        let mut config = match &self.config {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        if let Some(dir) = &self.cache_dir {
            config.cache.directory = dir.clone();
        }
        Ok(config)
    }

    /// Starts an engine owning its runtime.
    pub fn start_engine(&self) -> Result<TileEngine, CliError> {
        let config = self.load_config()?;
        TileEngine::start_sync(EngineConfig::from_config_file(&config)).map_err(CliError::EngineStart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_dir_override() {
        let temp = TempDir::new().unwrap();
        let options = GlobalOptions {
            config: Some(temp.path().join("missing.ini")),
            cache_dir: Some(temp.path().join("tiles")),
        };
        let config = options.load_config().unwrap();
        assert_eq!(config.cache.directory, temp.path().join("tiles"));
    }
}
