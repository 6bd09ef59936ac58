//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$BURNER_INBOX_CONFIG` (environment variable)
//! 2. `<config dir>/burner-inbox/config.toml`
//! 3. Built-in defaults

use crate::address::DEFAULT_DOMAIN;
use crate::inbox::{DEFAULT_PREFIX, PollSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "BURNER_INBOX_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub storage: StorageConfig,
    pub polling: PollingConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Domain part of generated addresses.
    pub domain: String,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Where delivered mail lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the directory-backed blob store.
    pub mail_dir: PathBuf,
    /// Key prefix that delivered messages are stored under.
    pub prefix: String,
    /// JSON file holding issued addresses.
    pub registry_file: Option<PathBuf>,
}

/// Refresh timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between scheduled scans.
    pub interval_secs: u64,
    /// Seconds a manual refresh must wait after the last scan.
    pub cooldown_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mail_dir: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
            registry_file: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            cooldown_secs: 10,
        }
    }
}

impl PollingConfig {
    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.interval_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
#[must_use]
pub fn load_config() -> Config {
    config_file_path().map_or_else(Config::default, |path| load_config_from(&path))
}

/// Load configuration from a specific file, falling back to defaults.
#[must_use]
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Registry file, defaulting to the platform data directory.
#[must_use]
pub fn registry_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.storage.registry_file {
        return path.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("burner-inbox")
        .join("addresses.json")
}

/// Determine the config file path (checking env var first, then standard dirs).
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("burner-inbox").join("config.toml"))
}
