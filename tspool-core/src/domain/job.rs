//! Job domain types

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dto::job::NewJob;

/// Length of the opaque job identifier
pub const JOB_ID_LEN: usize = 8;

/// A queued shell command and its execution outcome
///
/// Invariants maintained by the runner:
/// - `pid` is set iff `status == Running`
/// - `finished_at` and `rc` are set iff the status is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub status: JobStatus,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub finished_at: Option<DateTime<FixedOffset>>,
    pub rc: Option<i32>,
    pub out_file: PathBuf,
    pub err_file: PathBuf,
    pub cwd: Option<String>,
    pub pid: Option<u32>,
    pub priority: i32,
    pub paused: bool,
    pub gpu: Option<String>,
}

impl Job {
    /// Builds a fresh queued job for `req`, with log sinks under `out_dir`
    pub fn new(req: NewJob, out_dir: &Path) -> Self {
        let id = new_job_id();
        let (out_file, err_file) = log_paths(out_dir, &id);

        Self {
            id,
            command: req.command,
            status: JobStatus::Queued,
            created_at: local_now(),
            started_at: None,
            finished_at: None,
            rc: None,
            out_file,
            err_file,
            cwd: req.cwd,
            pid: None,
            priority: req.priority,
            paused: false,
            gpu: req.gpu,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Human label for the device the job is pinned to
    pub fn device_label(&self) -> String {
        match &self.gpu {
            Some(gpu) => format!("GPU {}", gpu),
            None => "CPU".to_string(),
        }
    }
}

/// Job execution status
///
/// `Queued` and `Running` are the only non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// Terminal status for a process that exited with `rc`
    pub fn from_exit_code(rc: i32) -> Self {
        if rc == 0 {
            JobStatus::Done
        } else {
            JobStatus::Failed
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Generates a short opaque job id
pub fn new_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(JOB_ID_LEN);
    id
}

/// Stdout and stderr sink paths for a job id
pub fn log_paths(out_dir: &Path, id: &str) -> (PathBuf, PathBuf) {
    (
        out_dir.join(format!("{}.out", id)),
        out_dir.join(format!("{}.err", id)),
    )
}

/// Current time in the local zone, pinned to its offset
pub fn local_now() -> DateTime<FixedOffset> {
    chrono::Local::now().fixed_offset()
}
