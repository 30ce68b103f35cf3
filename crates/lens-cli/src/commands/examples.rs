//! `lens examples`: list the bundled sample clauses

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use console::style;

use crate::commands::Command;
use lens_cli::{client::EXAMPLE_CLAUSES, Config};

#[derive(Args, Debug)]
pub struct ExamplesCommand {}

#[async_trait]
impl Command for ExamplesCommand {
    async fn execute(&self, _config: &Config) -> Result<()> {
        println!("{}", style("Try these examples").bold());
        for (i, clause) in EXAMPLE_CLAUSES.iter().enumerate() {
            println!("  {}. {}", style(i + 1).cyan(), clause);
        }
        println!();
        println!("Submit one with: lens simplify --example <N>");
        Ok(())
    }
}
