//! Middleware components for the server

use crate::config::CorsConfig;
use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;
    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed_ms = %elapsed.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed_ms = %elapsed.as_millis(),
            "Request completed"
        );
    }

    response
}

/// Build the CORS layer. Only an empty origin list allows any origin; a list
/// with an unusable entry allows none.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    match config.origins() {
        Ok(origins) => layer.allow_origin(origins),
        Err(origin) => {
            warn!(origin = %origin, "Invalid CORS origin, cross-origin requests disabled");
            layer.allow_origin(Vec::<HeaderValue>::new())
        }
    }
}
