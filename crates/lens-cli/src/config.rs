//! Configuration management for Lens CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the simplifier API
    pub api_url: String,

    /// Timeout for the status check, in seconds
    pub health_timeout_secs: u64,

    /// Timeout for a simplification request, in seconds
    pub simplify_timeout_secs: u64,

    /// Default sampling temperature
    pub temperature: f64,

    /// Maximum number of tokens the model may generate
    pub max_new_tokens: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:7860".to_string(),
            health_timeout_secs: 5,
            simplify_timeout_secs: 60,
            temperature: 0.3,
            max_new_tokens: 256,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            let config = Config::default();
            // A read-only home directory should not stop the client from working
            if let Err(e) = config.save(&config_path) {
                warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
            .join("legal-lens")
            .join("config.toml")
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn simplify_timeout(&self) -> Duration {
        Duration::from_secs(self.simplify_timeout_secs)
    }
}
