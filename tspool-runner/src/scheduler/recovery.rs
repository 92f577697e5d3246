//! Orphan recovery
//!
//! A worker that exits leaves its jobs marked running. On startup those
//! records are reconciled: jobs whose process group is gone are failed,
//! live ones are adopted so their slot and gpu stay reserved until they exit.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tspool_core::domain::job::JobStatus;
use tspool_core::dto::job::JobFilter;
use tspool_store::JobStore;

use crate::error::Result;
use crate::scheduler::Reservations;
use crate::service::StatusTracker;
use crate::service::signal::group_alive;

/// Exit code recorded for jobs whose real exit status was lost
pub const ORPHAN_RC: i32 = -1;

/// What startup recovery found
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs finalized as failed because their process was gone
    pub failed: Vec<String>,
    /// Jobs still alive and now watched by this worker
    pub adopted: Vec<String>,
}

/// Reconciles jobs left running by a previous worker
pub async fn recover_orphans(
    store: &dyn JobStore,
    reservations: &Arc<Reservations>,
    tracker: &Arc<StatusTracker>,
    interval: Duration,
    shutdown: &CancellationToken,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for job in store.list(&JobFilter::with_status(JobStatus::Running)).await? {
        match job.pid.filter(|pid| group_alive(*pid)) {
            Some(pid) => {
                if !reservations.reserve(&job.id, job.gpu.as_deref()) {
                    warn!("Could not reserve resources for orphaned job {}", job.id);
                    continue;
                }
                info!("Adopting orphaned job {} (PID {})", job.id, pid);
                watch(
                    job.id.clone(),
                    pid,
                    Arc::clone(tracker),
                    interval,
                    shutdown.clone(),
                );
                report.adopted.push(job.id);
            }
            None => {
                warn!(
                    "Job {} was left running without a process; marking failed",
                    job.id
                );
                tracker.finalize(&job.id, ORPHAN_RC).await;
                report.failed.push(job.id);
            }
        }
    }

    if !report.failed.is_empty() || !report.adopted.is_empty() {
        info!(
            "Recovered {} orphaned job(s): {} failed, {} adopted",
            report.failed.len() + report.adopted.len(),
            report.failed.len(),
            report.adopted.len()
        );
    }

    Ok(report)
}

/// Polls an adopted process group until it disappears, then finalizes it
///
/// The exit code of a process this worker did not spawn cannot be
/// observed, so the job is recorded with `ORPHAN_RC`.
fn watch(
    job_id: String,
    pid: u32,
    tracker: Arc<StatusTracker>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if !group_alive(pid) {
                debug!("Adopted job {} (PID {}) has exited", job_id, pid);
                tracker.finalize(&job_id, ORPHAN_RC).await;
                return;
            }
        }
    });
}
