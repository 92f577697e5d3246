//! Job DTOs for submission and store access

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;

/// Request to enqueue a new command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub command: String,
    pub cwd: Option<String>,
    pub priority: i32,
    pub gpu: Option<String>,
}

/// Ordering applied by `JobStore::list`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobOrder {
    /// Oldest first
    #[default]
    Created,
    /// Priority descending, then oldest first
    Admission,
}

/// Filter for listing jobs
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub paused: Option<bool>,
    pub order: JobOrder,
}

impl JobFilter {
    /// Every job, oldest first
    pub fn all() -> Self {
        Self::default()
    }

    /// Queued, unpaused jobs in admission order
    pub fn admissible() -> Self {
        Self {
            status: Some(JobStatus::Queued),
            paused: Some(false),
            order: JobOrder::Admission,
        }
    }

    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Partial update applied atomically to one job record
///
/// `None` leaves a column untouched. For `pid` and `rc`, `Some(None)`
/// clears the column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub finished_at: Option<DateTime<FixedOffset>>,
    pub rc: Option<Option<i32>>,
    pub pid: Option<Option<u32>>,
    pub paused: Option<bool>,
}

impl JobUpdate {
    /// Transition to running with the spawned process id
    pub fn started(pid: u32, at: DateTime<FixedOffset>) -> Self {
        Self {
            status: Some(JobStatus::Running),
            started_at: Some(at),
            pid: Some(Some(pid)),
            ..Self::default()
        }
    }

    /// Terminal transition derived from the exit code; clears the pid
    pub fn finished(rc: i32, at: DateTime<FixedOffset>) -> Self {
        Self {
            status: Some(JobStatus::from_exit_code(rc)),
            finished_at: Some(at),
            rc: Some(Some(rc)),
            pid: Some(None),
            ..Self::default()
        }
    }

    pub fn paused(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::local_now;

    #[test]
    fn test_finished_update_clears_pid() {
        let update = JobUpdate::finished(3, local_now());
        assert_eq!(update.status, Some(JobStatus::Failed));
        assert_eq!(update.rc, Some(Some(3)));
        assert_eq!(update.pid, Some(None));
        assert!(update.paused.is_none());
    }

    #[test]
    fn test_started_update_sets_pid_and_status() {
        let update = JobUpdate::started(4242, local_now());
        assert_eq!(update.status, Some(JobStatus::Running));
        assert_eq!(update.pid, Some(Some(4242)));
        assert!(update.started_at.is_some());
        assert!(update.finished_at.is_none());
    }

    #[test]
    fn test_empty_update() {
        assert!(JobUpdate::default().is_empty());
        assert!(!JobUpdate::paused(true).is_empty());
    }

    #[test]
    fn test_admissible_filter() {
        let filter = JobFilter::admissible();
        assert_eq!(filter.status, Some(JobStatus::Queued));
        assert_eq!(filter.paused, Some(false));
        assert_eq!(filter.order, JobOrder::Admission);
    }
}
