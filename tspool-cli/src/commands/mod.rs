//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod control;
mod queue;
mod worker;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;
use queue::LogStream;

/// Top-level CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a command to the queue
    Add {
        /// The command to run (executed through the shell)
        cmd: String,

        /// Working directory for the job
        #[arg(long)]
        cwd: Option<String>,

        /// Job priority (higher runs first)
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i32,

        /// GPU device id to reserve (e.g. 0, 1). Omit to run on CPU
        #[arg(long)]
        gpu: Option<String>,
    },
    /// List jobs and their status
    Status {
        /// Print the job records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a job's stdout
    Output {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Show a job's stderr
    Error {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Remove a job and its logs, terminating it if running
    Remove {
        /// Job ID or unambiguous prefix
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Remove all jobs and logs
        #[arg(long)]
        all: bool,

        /// Do not ask for confirmation (with --all)
        #[arg(short, long)]
        force: bool,
    },
    /// Run the worker (process queued jobs)
    Worker {
        /// Number of concurrent jobs
        #[arg(short = 'j', long = "jobs", default_value_t = 1)]
        jobs: usize,
    },
    /// Pause a running job
    Pause {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Resume a paused job
    Resume {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Kill a running job (SIGTERM)
    Kill {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

impl Commands {
    /// Whether this command runs the long-lived worker
    pub fn is_worker(&self) -> bool {
        matches!(self, Commands::Worker { .. })
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Worker { jobs } => worker::run_worker(config, jobs).await,
        Commands::Add {
            cmd,
            cwd,
            priority,
            gpu,
        } => {
            let store = config.open_store().await?;
            queue::add_job(store.as_ref(), cmd, cwd, priority, gpu).await
        }
        Commands::Status { json } => {
            let store = config.open_store().await?;
            queue::list_jobs(store.as_ref(), json).await
        }
        Commands::Output { id } => {
            let store = config.open_store().await?;
            queue::show_log(store.as_ref(), &id, LogStream::Stdout).await
        }
        Commands::Error { id } => {
            let store = config.open_store().await?;
            queue::show_log(store.as_ref(), &id, LogStream::Stderr).await
        }
        Commands::Remove { id, all, force } => {
            let store = config.open_store().await?;
            queue::remove(store, id.as_deref(), all, force).await
        }
        Commands::Pause { id } => control::pause_job(config.open_store().await?, &id).await,
        Commands::Resume { id } => control::resume_job(config.open_store().await?, &id).await,
        Commands::Kill { id } => control::kill_job(config.open_store().await?, &id).await,
    }
}
