//! Status tracker
//!
//! Finalizes a job once its process is gone and frees its reservations.

use std::sync::Arc;
use tracing::{error, info, warn};
use tspool_core::domain::job::{JobStatus, local_now};
use tspool_core::dto::job::JobUpdate;
use tspool_store::JobStore;

use crate::scheduler::Reservations;

/// Records terminal outcomes and releases in-memory reservations
pub struct StatusTracker {
    store: Arc<dyn JobStore>,
    reservations: Arc<Reservations>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn JobStore>, reservations: Arc<Reservations>) -> Self {
        Self {
            store,
            reservations,
        }
    }

    /// Persists `done`/`failed` for `rc`, then releases the job's slot and gpu
    ///
    /// The release always happens after the store write has returned, so
    /// the poll loop never sees a free gpu while the record still says
    /// running. A failed write is logged and the slot is released anyway.
    pub async fn finalize(&self, job_id: &str, rc: i32) -> JobStatus {
        let update = JobUpdate::finished(rc, local_now());
        let status = JobStatus::from_exit_code(rc);

        match self.store.update(job_id, &update).await {
            Ok(true) => info!("Job {} finished: {} (rc={})", job_id, status, rc),
            Ok(false) => warn!("Job {} finished (rc={}) but was already removed", job_id, rc),
            Err(e) => error!("Failed to record completion of job {}: {}", job_id, e),
        }

        self.reservations.release(job_id);
        status
    }
}
