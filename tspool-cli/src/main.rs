//! tspool CLI
//!
//! Command-line interface for the task spooler: queue commands, inspect
//! their logs, control running jobs and run the worker.

mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tspool")]
#[command(about = "Single-host task spooler with priorities and GPU reservation", long_about = None)]
struct Cli {
    /// Path to the job queue database
    #[arg(long, env = "TSPOOL_DB", global = true)]
    db: Option<String>,

    /// Directory holding job stdout/stderr logs
    #[arg(long, env = "TSPOOL_OUT_DIR", global = true)]
    out_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The worker logs its lifecycle; one-shot commands only report problems
    let default_filter = if cli.command.is_worker() {
        "tspool=info,tspool_runner=info,tspool_store=warn"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::new(cli.db, cli.out_dir);

    handle_command(cli.command, &config).await
}
