//! Configuration file handling for `~/.wmcache/config.ini`.
//!
//! ```ini
//! [cache]
//! directory = ~/.wmcache/cache
//! index_save_delay_secs = 120
//! default_ttl_secs = 604800
//!
//! [fallback]
//! enabled = true
//! interval_secs = 30
//! initial_delay_secs = 1
//! staleness_secs = 30
//! max_cuts = 5
//!
//! [engine]
//! resolve_workers = 8
//! ```
//!
//! Missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use super::defaults::*;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub index_save_delay_secs: u64,
    pub default_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            index_save_delay_secs: DEFAULT_INDEX_SAVE_DELAY_SECS,
            default_ttl_secs: DEFAULT_TILE_TTL_SECS,
        }
    }
}

/// `[fallback]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSettingsFile {
    pub enabled: bool,
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub staleness_secs: u64,
    pub max_cuts: u8,
}

impl Default for FallbackSettingsFile {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_FALLBACK_ENABLED,
            interval_secs: DEFAULT_FALLBACK_INTERVAL_SECS,
            initial_delay_secs: DEFAULT_FALLBACK_INITIAL_DELAY_SECS,
            staleness_secs: DEFAULT_FALLBACK_STALENESS_SECS,
            max_cuts: DEFAULT_FALLBACK_MAX_CUTS,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub resolve_workers: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resolve_workers: DEFAULT_RESOLVE_WORKERS,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub fallback: FallbackSettingsFile,
    pub engine: EngineSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.wmcache/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("cache"))
            .set("directory", self.cache.directory.to_string_lossy())
            .set(
                "index_save_delay_secs",
                self.cache.index_save_delay_secs.to_string(),
            )
            .set("default_ttl_secs", self.cache.default_ttl_secs.to_string());
        ini.with_section(Some("fallback"))
            .set("enabled", self.fallback.enabled.to_string())
            .set("interval_secs", self.fallback.interval_secs.to_string())
            .set(
                "initial_delay_secs",
                self.fallback.initial_delay_secs.to_string(),
            )
            .set("staleness_secs", self.fallback.staleness_secs.to_string())
            .set("max_cuts", self.fallback.max_cuts.to_string());
        ini.with_section(Some("engine"))
            .set("resolve_workers", self.engine.resolve_workers.to_string());

        ini.write_to_file(path)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("index_save_delay_secs") {
            config.cache.index_save_delay_secs =
                parse_number("cache", "index_save_delay_secs", v)?;
        }
        if let Some(v) = section.get("default_ttl_secs") {
            config.cache.default_ttl_secs = parse_number("cache", "default_ttl_secs", v)?;
        }
    }

    if let Some(section) = ini.section(Some("fallback")) {
        if let Some(v) = section.get("enabled") {
            config.fallback.enabled = parse_bool("fallback", "enabled", v)?;
        }
        if let Some(v) = section.get("interval_secs") {
            let interval: u64 = parse_number("fallback", "interval_secs", v)?;
            if interval == 0 {
                return Err(invalid("fallback", "interval_secs", v, "must be at least 1"));
            }
            config.fallback.interval_secs = interval;
        }
        if let Some(v) = section.get("initial_delay_secs") {
            config.fallback.initial_delay_secs =
                parse_number("fallback", "initial_delay_secs", v)?;
        }
        if let Some(v) = section.get("staleness_secs") {
            config.fallback.staleness_secs = parse_number("fallback", "staleness_secs", v)?;
        }
        if let Some(v) = section.get("max_cuts") {
            let cuts: u8 = parse_number("fallback", "max_cuts", v)?;
            if !(1..=crate::coord::LEVEL_MAX).contains(&cuts) {
                return Err(invalid(
                    "fallback",
                    "max_cuts",
                    v,
                    "must be between 1 and 22",
                ));
            }
            config.fallback.max_cuts = cuts;
        }
    }

    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = section.get("resolve_workers") {
            let workers: usize = parse_number("engine", "resolve_workers", v)?;
            if workers == 0 {
                return Err(invalid("engine", "resolve_workers", v, "must be at least 1"));
            }
            config.engine.resolve_workers = workers;
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a non-negative integer"))
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "expected true or false")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Get the path to the config directory (~/.wmcache).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wmcache")
}

/// Get the path to the config file (~/.wmcache/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
