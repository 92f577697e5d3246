//! Job control command handlers
//!
//! Pause, resume and kill running jobs by signalling their process group.

use anyhow::Result;
use colored::*;
use std::sync::Arc;
use tspool_runner::{SignalController, SignalOutcome};
use tspool_store::JobStore;

use crate::id_resolver::resolve_job_id;

/// Stop a running job with SIGSTOP
pub async fn pause_job(store: Arc<dyn JobStore>, id: &str) -> Result<()> {
    let id = resolve_job_id(store.as_ref(), id).await?;
    let outcome = SignalController::new(store).pause(&id).await?;

    match outcome {
        SignalOutcome::Signalled { pid } => {
            println!("{} Job {} (PID {}) paused.", "✓".green(), id.cyan(), pid)
        }
        SignalOutcome::Unchanged => println!("Job {} is already paused.", id.cyan()),
    }

    Ok(())
}

/// Continue a paused job with SIGCONT
pub async fn resume_job(store: Arc<dyn JobStore>, id: &str) -> Result<()> {
    let id = resolve_job_id(store.as_ref(), id).await?;
    let outcome = SignalController::new(store).resume(&id).await?;

    match outcome {
        SignalOutcome::Signalled { pid } => {
            println!("{} Job {} (PID {}) resumed.", "✓".green(), id.cyan(), pid)
        }
        SignalOutcome::Unchanged => println!("Job {} is not paused.", id.cyan()),
    }

    Ok(())
}

/// Terminate a running job with SIGTERM
pub async fn kill_job(store: Arc<dyn JobStore>, id: &str) -> Result<()> {
    let id = resolve_job_id(store.as_ref(), id).await?;
    let outcome = SignalController::new(store).kill(&id).await?;

    if let SignalOutcome::Signalled { pid } = outcome {
        println!("{} Sent SIGTERM to job {} (PID {}).", "✓".green(), id.cyan(), pid);
    }

    Ok(())
}
