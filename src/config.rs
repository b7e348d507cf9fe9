use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "featureflags";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_LOG_FILTER: &str = "featureflags=info";

/// Settings for the `ffctl` binary.
///
/// Read from `<config dir>/featureflags/config.json`, then overridden by
/// `FEATUREFLAGS_DB` and `FEATUREFLAGS_LOG`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or from the user's config directory
    /// when `path` is `None`, with environment overrides applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::from_path(&get_config_path()?)?,
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from an explicit file. A missing file yields defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Apply `FEATUREFLAGS_DB` and `FEATUREFLAGS_LOG` on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("FEATUREFLAGS_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Ok(filter) = std::env::var("FEATUREFLAGS_LOG") {
            self.log_filter = Some(filter);
        }
        self
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
