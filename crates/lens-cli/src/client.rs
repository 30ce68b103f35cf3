//! HTTP client for the simplifier API
//!
//! Every call is made exactly once, without retries. The `render_*`
//! functions map each outcome to the message shown to the user.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Sample clauses offered by `lens examples`
pub const EXAMPLE_CLAUSES: [&str; 3] = [
    "In witness whereof, the parties hereto have executed this Agreement as of the date first above written.",
    "Notwithstanding any provision herein to the contrary, the indemnifying party shall hold harmless the indemnified party from any and all claims, damages, losses, costs, and expenses.",
    "The lessee shall not assign, sublease, or otherwise transfer any interest in the demised premises without the prior written consent of the lessor.",
];

pub const EMPTY_CLAUSE_MESSAGE: &str = "Please enter a legal clause to simplify.";
pub const NO_SIMPLIFICATION_MESSAGE: &str = "No simplification returned.";
pub const MODEL_LOADING_MESSAGE: &str = "Model is still loading. Please wait a minute and try again.";
pub const TIMEOUT_MESSAGE: &str = "Request timed out. The model may be loading, please try again.";
pub const NON_200_MESSAGE: &str = "API returned non-200 status";
pub const OFFLINE_MESSAGE: &str = "API Offline or Still Loading";

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Offline(String),

    #[error("request timed out")]
    Timeout,

    #[error("Error {code}: {body}")]
    Status { code: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Offline(err.to_string())
        }
    }
}

/// Body of a successful `/health` response
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimplifyPayload<'a> {
    clause: &'a str,
    temperature: f64,
    max_new_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct SimplifyReply {
    #[serde(default)]
    simplified_text: String,
}

/// Client for a running lens-server
#[derive(Debug, Clone)]
pub struct LensClient {
    http: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    simplify_timeout: Duration,
    max_new_tokens: usize,
}

impl LensClient {
    pub fn new(
        base_url: impl Into<String>,
        health_timeout: Duration,
        simplify_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lens-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Offline(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            health_timeout,
            simplify_timeout,
            max_new_tokens: 256,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let mut client = Self::new(
            config.api_url.as_str(),
            config.health_timeout(),
            config.simplify_timeout(),
        )?;
        client.max_new_tokens = config.max_new_tokens;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = format!("{}/health", self.base_url);
        debug!("Probing {}", url);

        let response = self
            .http
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { code, body });
        }

        response
            .json::<HealthStatus>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// `POST /simplify` with an already validated clause
    pub async fn simplify(&self, clause: &str, temperature: f64) -> Result<String, ClientError> {
        let url = format!("{}/simplify", self.base_url);
        let payload = SimplifyPayload {
            clause,
            temperature,
            max_new_tokens: self.max_new_tokens,
        };
        debug!("Submitting {} chars to {}", clause.len(), url);

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .timeout(self.simplify_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let code = response.status().as_u16();
            let body = response.text().await?;
            return Err(ClientError::Status { code, body });
        }

        let reply: SimplifyReply = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(reply.simplified_text)
    }

    /// Check the service and describe what was found
    pub async fn check_status(&self) -> String {
        render_status(self.health().await)
    }

    /// Trim and submit a clause. Blank input is answered locally and never
    /// reaches the service.
    pub async fn submit(&self, clause: &str, temperature: f64) -> String {
        let clause = clause.trim();
        if clause.is_empty() {
            return EMPTY_CLAUSE_MESSAGE.to_string();
        }
        render_simplify(self.simplify(clause, temperature).await)
    }
}

/// Message for a status check outcome
pub fn render_status(outcome: Result<HealthStatus, ClientError>) -> String {
    match outcome {
        Ok(health) => format!(
            "API Online | Device: {}",
            health.device.as_deref().unwrap_or("unknown")
        ),
        Err(ClientError::Status { .. }) => NON_200_MESSAGE.to_string(),
        Err(_) => OFFLINE_MESSAGE.to_string(),
    }
}

/// Message for a simplification outcome
pub fn render_simplify(outcome: Result<String, ClientError>) -> String {
    match outcome {
        Ok(text) if text.is_empty() => NO_SIMPLIFICATION_MESSAGE.to_string(),
        Ok(text) => text,
        Err(ClientError::Status { code: 503, .. }) => MODEL_LOADING_MESSAGE.to_string(),
        Err(err @ ClientError::Status { .. }) => err.to_string(),
        Err(ClientError::Timeout) => TIMEOUT_MESSAGE.to_string(),
        Err(ClientError::Offline(msg)) | Err(ClientError::Decode(msg)) => {
            format!("Connection error: {}", msg)
        }
    }
}
