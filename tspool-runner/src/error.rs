//! Error taxonomy for spooler operations

use nix::errno::Errno;
use thiserror::Error;
use tspool_store::StoreError;

/// Result type alias for spooler operations
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Terminal outcome of a failed spooler operation
///
/// None of these are retried; each is reported to the immediate caller.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// Malformed request; the job never reaches the store
    #[error("invalid submission: {0}")]
    Submission(String),

    /// The job's process could not be created
    #[error("failed to spawn job {job_id}: {source}")]
    Spawn {
        job_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Delivering a signal to the job's process group failed
    #[error("failed to signal job {job_id} (PID {pid}): {source}")]
    Signal {
        job_id: String,
        pid: u32,
        #[source]
        source: Errno,
    },

    /// The job has no tracked process to signal
    #[error("no running process found for job {0}")]
    NoRunningProcess(String),

    /// No job with this id exists
    #[error("no such job: {0}")]
    NotFound(String),

    /// The store failed; nothing was written
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SpoolError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
