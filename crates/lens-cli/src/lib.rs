//! Lens CLI - client for the Legal Lens clause simplifier API
//!
//! The [`client`] module talks to a running `lens-server` and turns every
//! outcome, including transport failures, into a message fit for display.

pub mod client;
pub mod config;

pub use client::{ClientError, HealthStatus, LensClient};
pub use config::Config;
