//! coderadar CLI - repository code-intelligence indexer
//!
//! Scans a source tree, extracts structured code components, embeds and
//! stores them, and supports semantic search and incremental re-indexing.
//!
//! # Usage
//!
//! ```bash
//! # Build the initial index for the current directory
//! coderadar init
//!
//! # Reindex after edits, incrementally where possible
//! coderadar update
//!
//! # Search the indexed codebase
//! coderadar search "retry with backoff"
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// coderadar - semantic code search over an incrementally indexed repository
#[derive(Parser, Debug)]
#[command(name = "coderadar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Workspace root to operate on (defaults to the current directory)
    #[arg(long, short = 'w', global = true)]
    pub workspace: Option<PathBuf>,

    /// Path to a config file, used in place of the usual global/local lookup
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Override the number of worker threads used for scanning and embedding
    #[arg(long, global = true, env = "DEV_AGENT_CONCURRENCY")]
    pub concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a workspace's data directory and run a full index
    Init(commands::init::InitArgs),

    /// Run a full index of a workspace, discarding any prior state
    Index(commands::index::IndexArgs),

    /// Incrementally reindex a workspace, falling back to a full index if unindexed
    Update(commands::update::UpdateArgs),

    /// Search the indexed codebase semantically
    Search(commands::search::SearchArgs),

    /// Show index statistics
    Stats(commands::stats::StatsArgs),

    /// Remove a workspace's indexed state and vectors
    Clean(commands::clean::CleanArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(workers) = cli.global.concurrency {
        std::env::set_var(coderadar_core::CONCURRENCY_ENV_VAR, workers.to_string());
    }

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Stderr only: stdout stays clean for --json output consumed by scripts.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.global).await,
        Commands::Index(args) => commands::index::execute(args, cli.global).await,
        Commands::Update(args) => commands::update::execute(args, cli.global).await,
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Stats(args) => commands::stats::execute(args, cli.global).await,
        Commands::Clean(args) => commands::clean::execute(args, cli.global).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}
