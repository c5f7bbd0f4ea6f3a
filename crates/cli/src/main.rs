//! qakb CLI
//!
//! Main entry point for the qakb command-line tool.
//! Builds a local knowledge base from support documents and answers
//! retrieval queries against it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, CleanCommand, RetrieveCommand, StatsCommand};
use qakb_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// qakb - document retrieval for QA support material
#[derive(Parser, Debug)]
#[command(name = "qakb")]
#[command(about = "Build and query a local document knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "QAKB_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.qakb/config.yaml)
    #[arg(short, long, global = true, env = "QAKB_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the index from the support documents
    Build(BuildCommand),

    /// Retrieve the fragments most similar to a query
    Retrieve(RetrieveCommand),

    /// Show index statistics
    Stats(StatsCommand),

    /// Empty the index
    Clean(CleanCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load(cli.workspace, cli.config)?.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("qakb starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Config file: {:?}", config.config_file);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Retrieve(_) => "retrieve",
        Commands::Stats(_) => "stats",
        Commands::Clean(_) => "clean",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Build(cmd) => cmd.execute(&config).await,
            Commands::Retrieve(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
            Commands::Clean(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
