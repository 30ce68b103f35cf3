//! Lens Server - HTTP inference service for the Legal Lens clause simplifier
//!
//! Exposes `GET /health`, `POST /simplify` and a manual-testing page at `/`
//! in front of a single shared [`lens_core::engine::SimplifierEngine`].

/// Version of the lens-server crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{create_router, LensServer, ServerState};
