//! `lens status`: check the service health endpoint

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use console::style;
use tracing::debug;

use crate::commands::Command;
use lens_cli::{
    client::{render_status, LensClient},
    Config,
};

#[derive(Args, Debug)]
pub struct StatusCommand {}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&self, config: &Config) -> Result<()> {
        let client = LensClient::from_config(config)?;
        debug!("Checking {}", client.base_url());

        let outcome = client.health().await;
        let online = outcome.is_ok();
        let message = render_status(outcome);

        if online {
            println!("{}", style(message).green());
        } else {
            println!("{}", style(message).yellow());
        }
        Ok(())
    }
}
