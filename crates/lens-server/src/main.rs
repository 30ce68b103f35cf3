//! Lens Server - HTTP inference service for the Legal Lens clause simplifier

use clap::{Parser, Subcommand};
use lens_core::engine::ModelLoader;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lens_server::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    server::{run_server, LensServer},
};

/// Command line arguments
#[derive(Parser)]
#[command(
    name = "lens-server",
    version,
    about = "Legal Lens clause simplifier API",
    long_about = "Serves a Gemma model with the legal-lens LoRA adapter behind /health and /simplify, plus a manual-testing page at /."
)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "LENS_CONFIG")]
    config: Option<PathBuf>,

    /// Server bind address, overrides the configuration file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Start,
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "lens-server.toml")]
        output: PathBuf,
        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show server information
    Info,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    let args = Args::parse();

    init_logging(&args)?;

    match args.command {
        Some(Commands::Start) | None => start_server(args.config, args.bind).await,
        Some(Commands::Config { ref output, force }) => generate_config(output, force),
        Some(Commands::Validate { ref config }) => validate_config(config),
        Some(Commands::Info) => {
            show_info();
            Ok(())
        }
    }
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> ServerResult<()> {
    let log_level = args
        .log_level
        .parse::<Level>()
        .map_err(|_| ServerError::Config(format!("Invalid log level: {}", args.log_level)))?;

    let mut env_filter = EnvFilter::from_default_env();
    for target in ["lens_server", "lens_core", "tower_http"] {
        let directive = format!("{}={}", target, log_level)
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid log directive: {}", e)))?;
        env_filter = env_filter.add_directive(directive);
    }

    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().compact())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().pretty())
            .with(env_filter)
            .init();
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> ServerResult<ServerConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            ServerConfig::from_file(path)
                .map_err(|e| ServerError::Config(format!("Failed to load config: {}", e)))
        }
        None => {
            info!("Using default configuration");
            Ok(ServerConfig::default())
        }
    }
}

#[cfg(feature = "candle")]
fn model_loader() -> Option<Arc<dyn ModelLoader>> {
    Some(Arc::new(lens_core::backend::CandleLoader::from_env()))
}

#[cfg(not(feature = "candle"))]
fn model_loader() -> Option<Arc<dyn ModelLoader>> {
    None
}

/// Start the server
async fn start_server(config_path: Option<PathBuf>, bind: Option<SocketAddr>) -> ServerResult<()> {
    info!("Starting Legal Lens server v{}", lens_server::VERSION);

    let mut config = load_config(config_path.as_ref())?;
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let server = LensServer::new(config, model_loader())?;

    info!("Server configuration:");
    info!("  Bind address: {}", server.config().bind);
    info!("  Base model: {}", server.config().model.base_model_id);
    info!("  Adapter: {:?}", server.config().model.adapter_model_id);
    info!("  Device: {}", server.config().model.device);
    info!(
        "  Max concurrent generations: {}",
        server.config().limits.max_concurrent_generations
    );

    run_server(server).await
}

/// Generate a default configuration file
fn generate_config(output: &PathBuf, force: bool) -> ServerResult<()> {
    if output.exists() && !force {
        error!("Configuration file already exists: {:?}", output);
        error!("Use --force to overwrite");
        return Err(ServerError::Config(
            "Configuration file already exists".to_string(),
        ));
    }

    ServerConfig::default()
        .to_file(output)
        .map_err(|e| ServerError::Config(format!("Failed to write config: {}", e)))?;

    info!("Generated default configuration file: {:?}", output);
    Ok(())
}

/// Validate a configuration file
fn validate_config(config_path: &PathBuf) -> ServerResult<()> {
    info!("Validating configuration file: {:?}", config_path);

    let config = ServerConfig::from_file(config_path).map_err(|e| {
        error!("Configuration validation failed: {}", e);
        ServerError::Config(format!("Invalid configuration: {}", e))
    })?;
    config.validate()?;

    info!("Configuration is valid");
    info!("  Bind address: {}", config.bind);
    info!("  Base model: {}", config.model.base_model_id);
    info!("  Adapter: {:?}", config.model.adapter_model_id);
    info!("  Device: {}", config.model.device);
    Ok(())
}

/// Show server information
fn show_info() {
    println!("Legal Lens Server v{}", lens_server::VERSION);
    println!("Simplifies complicated legal clauses into plain English");
    println!();
    println!("Endpoints:");
    println!("  GET  /          manual-testing page");
    println!("  GET  /health    model readiness and device");
    println!("  POST /simplify  {{\"clause\": ..., \"max_new_tokens\": 256, \"temperature\": 0.3}}");
    println!();
    println!("Configuration:");
    println!("  • Default bind address: 0.0.0.0:7860");
    println!("  • HF_TOKEN: hub token for gated base models");
    println!("  • LENS__<SECTION>__<KEY>: overrides file settings");
    println!();
    println!("Usage:");
    println!("  lens-server                         # Start with default config");
    println!("  lens-server -c lens-server.toml     # Start with custom config");
    println!("  lens-server config                  # Generate default config");
    println!("  lens-server validate lens-server.toml  # Validate config file");
}
