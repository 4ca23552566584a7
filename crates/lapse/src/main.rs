//! Lapse - expiring session store
//!
//! Main entry point for the `lapse` CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use console::Style;
use lapse_store::StoreConfig;

mod commands;

use commands::{clear, count, destroy, get, set, sweep, watch};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Lapse - inspect and maintain an expiring session store
#[derive(Parser)]
#[command(name = "lapse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Session database file
    #[arg(long, global = true, env = "LAPSE_DB", default_value = "lapse-sessions.db")]
    pub db: PathBuf,

    /// Store configuration file (TOML)
    #[arg(long, global = true, env = "LAPSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write JSON logs to a daily rotated file in this directory
    #[arg(long, global = true, env = "LAPSE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how many sessions are stored
    Count(count::CountArgs),

    /// Print a session payload
    Get(get::GetArgs),

    /// Store a session payload
    Set(set::SetArgs),

    /// Delete a session
    Destroy(destroy::DestroyArgs),

    /// Delete every session
    Clear(clear::ClearArgs),

    /// Delete expired sessions once
    Sweep(sweep::SweepArgs),

    /// Run the expiration sweeper until interrupted
    Watch(watch::WatchArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let red = Style::new().red().bold();
        eprintln!("{} {:#}", red.apply_to("Error:"), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Console logging to stderr, plus an optional rotating JSON file
    let filter = if cli.verbose {
        "lapse=debug,lapse_store=debug,lapse_sqlite=debug,warn"
    } else {
        "lapse=info,lapse_store=warn,lapse_sqlite=warn,warn"
    };

    let _guard = {
        use tracing_subscriber::prelude::*;

        let console = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
            );

        match &cli.log_dir {
            Some(log_dir) => {
                let file_appender = tracing_appender::rolling::daily(log_dir, "lapse.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                tracing_subscriber::registry()
                    .with(console)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(non_blocking)
                            .with_filter(tracing_subscriber::EnvFilter::new(
                                "lapse=trace,lapse_store=trace,lapse_sqlite=trace,info",
                            )),
                    )
                    .init();
                Some(guard)
            }
            None => {
                tracing_subscriber::registry().with(console).init();
                None
            }
        }
    };

    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => StoreConfig::default(),
    };

    let ctx = commands::Context {
        db_path: cli.db,
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Count(args) => count::run(args, &ctx).await,
        Commands::Get(args) => get::run(args, &ctx).await,
        Commands::Set(args) => set::run(args, &ctx).await,
        Commands::Destroy(args) => destroy::run(args, &ctx).await,
        Commands::Clear(args) => clear::run(args, &ctx).await,
        Commands::Sweep(args) => sweep::run(args, &ctx).await,
        Commands::Watch(args) => watch::run(args, &ctx).await,
    }
}
