//! User configuration.
//!
//! Settings are read from `~/.wmcache/config.ini`; everything has a default
//! so the file is optional.

mod defaults;
mod file;

pub use defaults::*;
pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    EngineSettings, FallbackSettingsFile,
};
