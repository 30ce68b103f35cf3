//! Server configuration

use axum::http::HeaderValue;
use lens_core::{
    config::{EngineConfig, ModelSpec},
    generation::GenerationLimits,
    CoreError,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server binding address
    pub bind: SocketAddr,

    /// Model to load at startup
    pub model: ModelSpec,

    /// Request limits
    pub limits: RequestLimits,

    /// CORS configuration
    pub cors: CorsConfig,
}

/// Request size and generation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Largest accepted `max_new_tokens`
    pub max_new_tokens: usize,

    /// Largest accepted `temperature`
    pub max_temperature: f64,

    /// Generations allowed on the device at once
    pub max_concurrent_generations: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,

    /// Allowed origins (empty means all)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 7860)),
            model: ModelSpec::default(),
            limits: RequestLimits::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        let generation = GenerationLimits::default();
        Self {
            max_body_size: 64 * 1024,
            max_new_tokens: generation.max_new_tokens,
            max_temperature: generation.max_temperature,
            max_concurrent_generations: 1,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
        }
    }
}

impl CorsConfig {
    /// Parse `allowed_origins`. The error names the first entry that is not
    /// an `http(s)://` origin.
    pub fn origins(&self) -> Result<Vec<HeaderValue>, String> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                let origin = origin.trim();
                if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                    return Err(origin.to_string());
                }
                origin
                    .parse::<HeaderValue>()
                    .map_err(|_| origin.to_string())
            })
            .collect()
    }
}

impl ServerConfig {
    /// Load configuration from file, with `LENS__`-prefixed environment
    /// variables taking precedence (e.g. `LENS__MODEL__DEVICE=cpu`)
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("LENS").prefix_separator("__").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to file
    pub fn to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: GenerationLimits {
                max_new_tokens: self.limits.max_new_tokens,
                max_temperature: self.limits.max_temperature,
            },
            max_concurrent_generations: self.limits.max_concurrent_generations,
        }
    }

    /// Check the values serde cannot check on its own
    pub fn validate(&self) -> lens_core::Result<()> {
        self.model.validate()?;
        if self.cors.enabled {
            self.cors.origins().map_err(|origin| {
                CoreError::configuration(
                    "CONFIG_INVALID_ORIGIN",
                    format!("cors.allowed_origins entry {origin:?} is not a valid origin"),
                    "Use a scheme and host such as https://example.org",
                    "allowed_origins",
                )
            })?;
        }
        self.engine_config().validate()
    }
}
