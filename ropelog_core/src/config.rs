//! Configuration file support for Ropelog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ropelog/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub owner: OwnerConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Local owner identity (all session operations are scoped to it)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner_id")]
    pub id: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            id: default_owner_id(),
        }
    }
}

/// Session lifecycle parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_min_goal")]
    pub min_goal: u32,

    /// Seconds without a progress update before auto-pause fires
    #[serde(default = "default_idle_window_seconds")]
    pub idle_window_seconds: i64,

    /// Seconds between client reconciliations with the stored session
    #[serde(default = "default_resync_interval_seconds")]
    pub resync_interval_seconds: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_goal: default_min_goal(),
            idle_window_seconds: default_idle_window_seconds(),
            resync_interval_seconds: default_resync_interval_seconds(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("ropelog")
}

fn default_owner_id() -> String {
    "local".into()
}

fn default_min_goal() -> u32 {
    100
}

fn default_idle_window_seconds() -> i64 {
    600
}

fn default_resync_interval_seconds() -> i64 {
    30
}

impl Config {
    /// Load the config from its standard location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and parse a config file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: Config = toml::from_str(&contents)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/ropelog/config.toml` (or the platform equivalent).
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("ropelog").join("config.toml")
    }

    /// Write the config as pretty TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
