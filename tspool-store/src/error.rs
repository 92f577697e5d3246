//! Error types for the job store

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database unreachable or statement failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error while preparing the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be decoded into a job
    #[error("corrupt record for job {id}: {reason}")]
    Corrupt {
        /// Job id of the offending row
        id: String,
        /// What failed to decode
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
