//! Clause simplification handler

use crate::{error::ServerResult, server::ServerState};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use lens_core::generation::{GenerationParams, DEFAULT_MAX_NEW_TOKENS, DEFAULT_TEMPERATURE};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Simplification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifyRequest {
    /// The legal clause to simplify
    pub clause: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_new_tokens() -> usize {
    DEFAULT_MAX_NEW_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl SimplifyRequest {
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
        }
    }
}

/// Simplification response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifyResponse {
    pub simplified_text: String,
}

/// Simplify a legal clause into plain English
pub async fn simplify_clause(
    State(state): State<ServerState>,
    payload: Result<Json<SimplifyRequest>, JsonRejection>,
) -> ServerResult<Json<SimplifyResponse>> {
    let Json(request) = payload?;
    info!(
        clause_chars = request.clause.len(),
        max_new_tokens = request.max_new_tokens,
        temperature = request.temperature,
        "Simplify request"
    );

    let simplified_text = state
        .engine
        .simplify(&request.clause, request.params())
        .await?;

    Ok(Json(SimplifyResponse { simplified_text }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: SimplifyRequest =
            serde_json::from_str(r#"{"clause": "The tenant shall pay rent."}"#).unwrap();
        assert_eq!(request.max_new_tokens, 256);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.params(), GenerationParams::default());
    }

    #[test]
    fn test_request_overrides() {
        let request: SimplifyRequest = serde_json::from_str(
            r#"{"clause": "x", "max_new_tokens": 64, "temperature": 0.9}"#,
        )
        .unwrap();
        assert_eq!(request.params().max_new_tokens, 64);
        assert_eq!(request.params().temperature, 0.9);
    }

    #[test]
    fn test_negative_token_count_does_not_parse() {
        let parsed =
            serde_json::from_str::<SimplifyRequest>(r#"{"clause": "x", "max_new_tokens": -1}"#);
        assert!(parsed.is_err());
    }
}
