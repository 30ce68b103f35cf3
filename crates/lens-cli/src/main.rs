//! Lens CLI - Command Line Interface for the Legal Lens API
//!
//! Checks whether the simplifier service is up and submits clauses to it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;
mod utils;

use commands::{
    examples::ExamplesCommand, simplify::SimplifyCommand, status::StatusCommand, Command,
};
use lens_cli::Config;

#[derive(Parser)]
#[command(
    name = "lens",
    version = env!("CARGO_PKG_VERSION"),
    about = "Legal Lens clause simplifier CLI",
    long_about = "Simplify complex legal clauses into plain English using a running lens-server. This tool is for informational purposes only and does not constitute legal advice."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LENS_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the simplifier API, overrides the configuration file
    #[arg(long, global = true, env = "LENS_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the API is online
    #[command(name = "status", alias = "s")]
    Status(StatusCommand),

    /// Simplify a legal clause
    #[command(name = "simplify", alias = "x")]
    Simplify(SimplifyCommand),

    /// List the sample clauses
    #[command(name = "examples", alias = "e")]
    Examples(ExamplesCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli)?;

    debug!("Lens CLI v{} starting", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    debug!("Configuration loaded: {:?}", config);

    // Execute command
    let result = match &cli.command {
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Simplify(cmd) => cmd.execute(&config).await,
        Commands::Examples(cmd) => cmd.execute(&config).await,
    };

    match result {
        Ok(_) => {
            if !cli.quiet {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
