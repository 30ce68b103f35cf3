//! Command implementations for Lens CLI

pub mod examples;
pub mod simplify;
pub mod status;

use anyhow::Result;
use async_trait::async_trait;
use lens_cli::Config;

/// Trait for CLI command execution
#[async_trait]
pub trait Command {
    /// Execute the command
    async fn execute(&self, config: &Config) -> Result<()>;
}
