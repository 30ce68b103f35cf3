//! Engine and model configuration

use crate::{generation::GenerationLimits, CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base model the adapter was trained on
pub const DEFAULT_BASE_MODEL_ID: &str = "google/gemma-2b";

/// LoRA adapter that specialises the base model for clause simplification
pub const DEFAULT_ADAPTER_MODEL_ID: &str = "Agent-Omkar/legal-lens-clause-simplifier";

/// Compute backend requested for the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Metal => "metal",
        };
        f.write_str(name)
    }
}

/// Which weights to load and where to run them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Hub id of the base model
    pub base_model_id: String,

    /// Hub id of the adapter merged on top of the base model
    pub adapter_model_id: Option<String>,

    /// Revision of the base model repository
    pub revision: String,

    pub device: DevicePreference,

    /// Fixed sampling seed; a fresh random seed per request when unset
    pub seed: Option<u64>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            base_model_id: DEFAULT_BASE_MODEL_ID.to_string(),
            adapter_model_id: Some(DEFAULT_ADAPTER_MODEL_ID.to_string()),
            revision: "main".to_string(),
            device: DevicePreference::Auto,
            seed: None,
        }
    }
}

impl ModelSpec {
    pub fn validate(&self) -> Result<()> {
        if self.base_model_id.trim().is_empty() {
            return Err(CoreError::configuration(
                "CONFIG_MISSING_BASE_MODEL",
                "base_model_id must not be empty",
                "Set model.base_model_id to a hub repository such as google/gemma-2b",
                "base_model_id",
            ));
        }
        if let Some(adapter) = &self.adapter_model_id {
            if adapter.trim().is_empty() {
                return Err(CoreError::configuration(
                    "CONFIG_EMPTY_ADAPTER",
                    "adapter_model_id is set but empty",
                    "Remove model.adapter_model_id or point it at an adapter repository",
                    "adapter_model_id",
                ));
            }
        }
        Ok(())
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounds applied to every generation request
    pub limits: GenerationLimits,

    /// Generations allowed to run on the device at once
    pub max_concurrent_generations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: GenerationLimits::default(),
            max_concurrent_generations: 1,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_generations == 0 {
            return Err(CoreError::configuration(
                "CONFIG_ZERO_CONCURRENCY",
                "max_concurrent_generations must be at least 1",
                "Use 1 unless the backend is known to be safe for parallel use",
                "max_concurrent_generations",
            ));
        }
        self.limits.validate_self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_points_at_adapter() {
        let spec = ModelSpec::default();
        assert_eq!(spec.base_model_id, "google/gemma-2b");
        assert_eq!(
            spec.adapter_model_id.as_deref(),
            Some("Agent-Omkar/legal-lens-clause-simplifier")
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_ids_rejected() {
        let spec = ModelSpec {
            base_model_id: "  ".to_string(),
            ..ModelSpec::default()
        };
        assert_eq!(spec.validate().unwrap_err().code(), "CONFIG_MISSING_BASE_MODEL");

        let spec = ModelSpec {
            adapter_model_id: Some(String::new()),
            ..ModelSpec::default()
        };
        assert_eq!(spec.validate().unwrap_err().code(), "CONFIG_EMPTY_ADAPTER");
    }

    #[test]
    fn test_device_preference_serde() {
        let pref: DevicePreference = serde_json::from_str("\"cuda\"").unwrap();
        assert_eq!(pref, DevicePreference::Cuda);
        assert_eq!(DevicePreference::Metal.to_string(), "metal");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig {
            max_concurrent_generations: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_ZERO_CONCURRENCY");
    }
}
