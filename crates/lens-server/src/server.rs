//! Core server implementation

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    handlers,
    middleware::{cors_layer, logging_middleware},
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use lens_core::engine::{ModelLoader, SimplifierEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Main server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub engine: Arc<SimplifierEngine>,
}

impl ServerState {
    pub fn new(config: Arc<ServerConfig>, engine: Arc<SimplifierEngine>) -> Self {
        Self { config, engine }
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: ServerState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::ui::index))
        .route("/health", get(handlers::health::health_check))
        .route("/simplify", post(handlers::simplify::simplify_clause))
        // Overflow surfaces as a `JsonRejection`, so it gets the JSON error body
        .layer(DefaultBodyLimit::max(state.config.limits.max_body_size))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http());

    if state.config.cors.enabled {
        router = router.layer(cors_layer(&state.config.cors));
    }

    router.with_state(state)
}

/// Legal Lens HTTP server
pub struct LensServer {
    state: ServerState,
    loader: Option<Arc<dyn ModelLoader>>,
}

impl LensServer {
    /// Create a new server instance. Without a loader the engine stays idle
    /// and `/health` keeps reporting unavailable.
    pub fn new(config: ServerConfig, loader: Option<Arc<dyn ModelLoader>>) -> ServerResult<Self> {
        config.validate()?;
        let engine = Arc::new(SimplifierEngine::new(config.engine_config()));
        let state = ServerState::new(Arc::new(config), engine);
        Ok(Self { state, loader })
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Get server state
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener. The model starts loading only once
    /// the listener is accepting, so `/health` answers during the load.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        match &self.loader {
            Some(loader) => {
                self.state
                    .engine
                    .spawn_load(Arc::clone(loader), self.state.config.model.clone());
            }
            None => warn!(stage = "startup", "No model backend compiled in; /simplify will answer 503"),
        }

        let engine = Arc::clone(&self.state.engine);
        let app = create_router(self.state);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)));

        info!("Shutting down Legal Lens server");
        engine.teardown();
        result
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Run server with graceful shutdown handling
pub async fn run_server(server: LensServer) -> ServerResult<()> {
    server.start(shutdown_signal()).await
}
