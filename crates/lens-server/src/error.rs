//! Error types for the Legal Lens server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lens_core::{engine::Readiness, CoreError};
use serde_json::json;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Model not loaded or still loading.")]
    NotReady(Readiness),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::InvalidRequest(rejection.body_text())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type, suggestion, details) = match &self {
            ServerError::Core(core_err) => Self::map_core_error(core_err),
            ServerError::NotReady(readiness) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "model_unavailable",
                "Wait for the model to finish loading and try again".to_string(),
                Some(json!({ "readiness": readiness })),
            ),
            ServerError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Check the request format and required parameters".to_string(),
                Some(json!({ "message": msg })),
            ),
            ServerError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Send a shorter clause".to_string(),
                Some(json!({ "message": msg })),
            ),
            ServerError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                "Contact system administrator - server configuration issue".to_string(),
                Some(json!({ "message": msg })),
            ),
            ServerError::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                "Check file system permissions and disk space".to_string(),
                Some(json!({ "message": err.to_string() })),
            ),
            ServerError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_server_error",
                "Contact support if this error persists".to_string(),
                Some(json!({ "message": msg })),
            ),
        };

        let mut error_response = json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "code": status.as_u16(),
                "suggestion": suggestion,
                "timestamp": chrono::Utc::now().timestamp(),
                "request_id": format!("req_{}", uuid::Uuid::new_v4().simple()),
            }
        });

        if let Some(details) = details {
            error_response["error"]["details"] = details;
        }

        (status, Json(error_response)).into_response()
    }
}

impl ServerError {
    /// Map core errors to HTTP responses. Generation failures carry the
    /// underlying message as-is.
    fn map_core_error(
        core_err: &CoreError,
    ) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
        let suggestion = core_err.suggestion().to_string();
        let code = core_err.code();

        match core_err {
            CoreError::InvalidInput {
                parameter_name,
                valid_range,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                suggestion,
                Some(json!({
                    "error_code": code,
                    "parameter": parameter_name,
                    "valid_range": valid_range,
                })),
            ),
            CoreError::ModelUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "model_unavailable",
                suggestion,
                Some(json!({ "error_code": code, "retriable": true })),
            ),
            CoreError::Generation { message, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "generation_error",
                suggestion,
                Some(json!({ "error_code": code, "detail": message })),
            ),
            CoreError::Model { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "model_error",
                suggestion,
                Some(json!({ "error_code": code, "component": "model_loading" })),
            ),
            CoreError::Configuration { field_name, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                suggestion,
                Some(json!({ "error_code": code, "field": field_name })),
            ),
        }
    }
}
