//! Lens Core - clause simplification engine
//!
//! This crate owns the prompt contract the adapter was tuned on, the
//! generation parameter rules, and the lifecycle of the single shared model
//! handle. The model itself sits behind the [`engine::TextGenerator`] and
//! [`engine::ModelLoader`] traits; the `candle` feature provides the concrete
//! Gemma + LoRA backend.

pub mod config;
pub mod engine;
pub mod generation;
pub mod prompt;

#[cfg(feature = "candle")]
pub mod backend;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Model download, weight or tokenizer failures at load time
    #[error("Model error [{code}]: {message}\nSuggestion: {suggestion}")]
    Model {
        code: &'static str,
        message: String,
        suggestion: String,
    },

    /// The shared model handle is not ready to serve
    #[error("Model unavailable [{code}]: {message}")]
    ModelUnavailable {
        code: &'static str,
        message: String,
        suggestion: String,
    },

    /// Request validation errors, raised before any generation work
    #[error("Invalid input [{code}]: {message}")]
    InvalidInput {
        code: &'static str,
        message: String,
        suggestion: String,
        parameter_name: Option<String>,
        valid_range: Option<String>,
    },

    /// Failures raised while the model is generating
    #[error("Generation error [{code}]: {message}")]
    Generation {
        code: &'static str,
        message: String,
        suggestion: String,
    },

    /// Configuration parsing and validation errors
    #[error("Configuration error [{code}]: {message}\nSuggestion: {suggestion}")]
    Configuration {
        code: &'static str,
        message: String,
        suggestion: String,
        field_name: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a load-stage model error
    pub fn model<S1, S2>(code: &'static str, message: S1, suggestion: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::Model {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn model_unavailable<S1, S2>(code: &'static str, message: S1, suggestion: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::ModelUnavailable {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn invalid_input<S1, S2>(code: &'static str, message: S1, suggestion: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
            parameter_name: None,
            valid_range: None,
        }
    }

    /// Create an invalid input error naming the offending parameter
    pub fn invalid_parameter<S1, S2, S3, S4>(
        code: &'static str,
        message: S1,
        suggestion: S2,
        parameter_name: S3,
        valid_range: S4,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
            parameter_name: Some(parameter_name.into()),
            valid_range: Some(valid_range.into()),
        }
    }

    pub fn generation<S1, S2>(code: &'static str, message: S1, suggestion: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::Generation {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn configuration<S1, S2, S3>(
        code: &'static str,
        message: S1,
        suggestion: S2,
        field_name: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
            field_name: Some(field_name.into()),
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::Model { code, .. } => code,
            Self::ModelUnavailable { code, .. } => code,
            Self::InvalidInput { code, .. } => code,
            Self::Generation { code, .. } => code,
            Self::Configuration { code, .. } => code,
        }
    }

    /// The bare message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Model { message, .. }
            | Self::ModelUnavailable { message, .. }
            | Self::InvalidInput { message, .. }
            | Self::Generation { message, .. }
            | Self::Configuration { message, .. } => message,
        }
    }

    pub fn suggestion(&self) -> &str {
        match self {
            Self::Model { suggestion, .. }
            | Self::ModelUnavailable { suggestion, .. }
            | Self::InvalidInput { suggestion, .. }
            | Self::Generation { suggestion, .. }
            | Self::Configuration { suggestion, .. } => suggestion,
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        config::{DevicePreference, EngineConfig, ModelSpec},
        engine::{ModelLoader, Readiness, SimplifierEngine, TextGenerator},
        generation::{GenerationLimits, GenerationParams},
        prompt::{extract_response, format_prompt},
        CoreError, Result,
    };
}
