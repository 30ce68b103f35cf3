//! `lens simplify`: submit a clause and print the plain-English version

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::commands::Command;
use crate::utils::{create_spinner, format_duration, print_warning};
use lens_cli::{
    client::{LensClient, EMPTY_CLAUSE_MESSAGE, EXAMPLE_CLAUSES},
    Config,
};

#[derive(Args, Debug)]
pub struct SimplifyCommand {
    /// Legal clause to simplify; read from stdin when omitted
    #[arg(conflicts_with_all = ["file", "example"])]
    pub clause: Option<String>,

    /// Read the clause from a file
    #[arg(short, long, conflicts_with = "example")]
    pub file: Option<PathBuf>,

    /// Submit one of the bundled examples (see `lens examples`)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub example: Option<u8>,

    /// Sampling temperature, lower is more precise
    #[arg(short, long)]
    pub temperature: Option<f64>,
}

#[async_trait]
impl Command for SimplifyCommand {
    async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing simplify command: {:?}", self);

        let clause = self.resolve_clause().await?;
        if clause.trim().is_empty() {
            print_warning(EMPTY_CLAUSE_MESSAGE);
            return Ok(());
        }

        let temperature = self.temperature.unwrap_or(config.temperature);
        let client = LensClient::from_config(config)?;
        info!("Submitting clause to {}", client.base_url());

        let spinner = create_spinner("Simplifying...");
        let started = Instant::now();
        let message = client.submit(&clause, temperature).await;
        spinner.finish_and_clear();
        debug!("Request finished in {}", format_duration(started.elapsed()));

        println!("{}", style("Plain English").bold());
        println!("{}", message);
        Ok(())
    }
}

impl SimplifyCommand {
    async fn resolve_clause(&self) -> Result<String> {
        if let Some(n) = self.example {
            return match EXAMPLE_CLAUSES.get(usize::from(n) - 1) {
                Some(clause) => Ok(clause.to_string()),
                None => bail!("No example number {}", n),
            };
        }

        if let Some(path) = &self.file {
            return tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read clause file: {}", path.display()));
        }

        if let Some(clause) = &self.clause {
            return Ok(clause.clone());
        }

        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read clause from stdin")?;
        Ok(input)
    }
}
