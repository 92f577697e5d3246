//! Worker command handler

use anyhow::{Context, Result};
use colored::*;
use tracing::info;
use tspool_runner::JobPoller;
use tspool_runner::shutdown::install_shutdown_handler;

use crate::config::Config;

/// Run the scheduler until SIGINT or SIGTERM
pub async fn run_worker(config: &Config, jobs: usize) -> Result<()> {
    let spool = config.spool.clone().with_parallel_jobs(jobs);
    spool.validate()?;

    let store = config.open_store().await?;
    let shutdown = install_shutdown_handler().context("Failed to install signal handlers")?;

    println!(
        "{} Worker started with {} concurrent job(s). Press Ctrl-C to stop.",
        "▶".green(),
        spool.max_parallel_jobs
    );
    println!("  Queue: {}", spool.db_path.display());
    println!("  Logs:  {}", spool.out_dir.display());

    let poller = JobPoller::new(spool, store);
    poller.run(shutdown).await?;

    info!("Worker stopped");
    Ok(())
}
