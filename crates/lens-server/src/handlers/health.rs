//! Health check handler

use crate::{
    error::{ServerError, ServerResult},
    server::ServerState,
};
use axum::{extract::State, Json};
use lens_core::engine::Readiness;
use serde::{Deserialize, Serialize};

/// Body of a successful health check
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub device: String,
}

/// Healthy once the model is loaded, 503 with the readiness state otherwise
pub async fn health_check(State(state): State<ServerState>) -> ServerResult<Json<HealthResponse>> {
    match state.engine.readiness() {
        Readiness::Ready { device } => Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            device,
        })),
        readiness => Err(ServerError::NotReady(readiness)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use lens_core::{
        engine::{SimplifierEngine, TextGenerator},
        generation::GenerationParams,
    };
    use std::sync::Arc;

    struct CudaStub;

    impl TextGenerator for CudaStub {
        fn device(&self) -> &str {
            "cuda"
        }

        fn generate(&self, _prompt: &str, _params: &GenerationParams) -> lens_core::Result<String> {
            Ok(String::new())
        }
    }

    fn create_test_state() -> ServerState {
        ServerState::new(
            Arc::new(ServerConfig::default()),
            Arc::new(SimplifierEngine::default()),
        )
    }

    #[tokio::test]
    async fn test_health_before_load() {
        let state = create_test_state();
        state.engine.mark_loading();

        let err = health_check(State(state)).await.unwrap_err();
        assert!(matches!(err, ServerError::NotReady(Readiness::Loading)));
    }

    #[tokio::test]
    async fn test_health_when_ready() {
        let state = create_test_state();
        state.engine.install(Arc::new(CudaStub));

        let response = health_check(State(state)).await.unwrap();
        assert_eq!(response.0.status, "healthy");
        assert_eq!(response.0.device, "cuda");
    }
}
