//! Generation parameters and request validation

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_NEW_TOKENS: usize = 256;
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Sampling settings for a single generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on tokens produced after the prompt
    pub max_new_tokens: usize,

    /// Sampling temperature; sampling is always enabled
    pub temperature: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Accepted ranges for request parameters. Values outside are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationLimits {
    /// Inclusive upper bound for `max_new_tokens`
    pub max_new_tokens: usize,

    /// Inclusive upper bound for `temperature`; the lower bound is exclusive zero
    pub max_temperature: f64,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_new_tokens: 1024,
            max_temperature: 2.0,
        }
    }
}

impl GenerationLimits {
    pub fn validate(&self, params: &GenerationParams) -> Result<()> {
        if params.max_new_tokens == 0 || params.max_new_tokens > self.max_new_tokens {
            return Err(CoreError::invalid_parameter(
                "INVALID_MAX_NEW_TOKENS",
                format!(
                    "max_new_tokens must be between 1 and {}, got {}",
                    self.max_new_tokens, params.max_new_tokens
                ),
                format!("Use the default of {DEFAULT_MAX_NEW_TOKENS}"),
                "max_new_tokens",
                format!("[1, {}]", self.max_new_tokens),
            ));
        }

        // Written so that NaN fails as well
        if !(params.temperature > 0.0 && params.temperature <= self.max_temperature) {
            return Err(CoreError::invalid_parameter(
                "INVALID_TEMPERATURE",
                format!(
                    "temperature must be greater than 0 and at most {}, got {}",
                    self.max_temperature, params.temperature
                ),
                format!("Use the default of {DEFAULT_TEMPERATURE}"),
                "temperature",
                format!("(0, {}]", self.max_temperature),
            ));
        }

        Ok(())
    }

    pub(crate) fn validate_self(&self) -> Result<()> {
        if self.max_new_tokens == 0 {
            return Err(CoreError::configuration(
                "CONFIG_INVALID_LIMIT",
                "limits.max_new_tokens must be at least 1",
                "Use 1024 or another positive value",
                "max_new_tokens",
            ));
        }
        if !(self.max_temperature > 0.0) {
            return Err(CoreError::configuration(
                "CONFIG_INVALID_LIMIT",
                "limits.max_temperature must be positive",
                "Use 2.0 or another positive value",
                "max_temperature",
            ));
        }
        Ok(())
    }
}

/// Reject clauses that are empty or whitespace-only.
pub fn validate_clause(clause: &str) -> Result<()> {
    if clause.trim().is_empty() {
        return Err(CoreError::invalid_parameter(
            "INVALID_CLAUSE",
            "clause must not be empty",
            "Provide the legal clause to simplify",
            "clause",
            "non-empty text",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 256);
        assert_eq!(params.temperature, 0.3);
        assert!(GenerationLimits::default().validate(&params).is_ok());
    }

    #[test]
    fn test_max_new_tokens_bounds() {
        let limits = GenerationLimits::default();
        for (tokens, ok) in [(0, false), (1, true), (1024, true), (1025, false)] {
            let params = GenerationParams {
                max_new_tokens: tokens,
                ..GenerationParams::default()
            };
            assert_eq!(limits.validate(&params).is_ok(), ok, "max_new_tokens={tokens}");
        }
    }

    #[test]
    fn test_temperature_bounds() {
        let limits = GenerationLimits::default();
        for (temperature, ok) in [
            (0.0, false),
            (-0.5, false),
            (f64::NAN, false),
            (0.1, true),
            (2.0, true),
            (2.01, false),
        ] {
            let params = GenerationParams {
                temperature,
                ..GenerationParams::default()
            };
            let result = limits.validate(&params);
            assert_eq!(result.is_ok(), ok, "temperature={temperature}");
            if let Err(err) = result {
                assert_eq!(err.code(), "INVALID_TEMPERATURE");
            }
        }
    }

    #[test]
    fn test_clause_validation() {
        assert!(validate_clause("The lessee shall pay rent.").is_ok());
        assert_eq!(validate_clause("").unwrap_err().code(), "INVALID_CLAUSE");
        assert_eq!(validate_clause(" \t\n ").unwrap_err().code(), "INVALID_CLAUSE");
    }
}
