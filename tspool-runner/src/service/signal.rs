//! Signal controller
//!
//! Pause, resume, kill and remove jobs out-of-band by signalling the
//! job's process group. Every operation reads the pid fresh from the
//! store, so it works from any process, not only the worker.
//!
//! Read-then-write sequences here (read pid, signal, write `paused`) are
//! not atomic with respect to other store clients. A concurrent `remove`
//! or job exit can land between the read and the signal. Signals are only
//! sent when the fresh record says running and carries a pid, but a pid
//! recycled by the OS as a new group leader in that window would still be
//! hit; no generation check guards against it.

use nix::errno::Errno;
use nix::unistd::Pid;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tspool_core::domain::job::Job;
use tspool_core::dto::job::{JobFilter, JobUpdate};
use tspool_store::JobStore;

use crate::error::{Result, SpoolError};

pub use nix::sys::signal::Signal;

/// What a pause/resume/kill request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was delivered to the process group led by `pid`
    Signalled { pid: u32 },
    /// The job was already in the requested state; nothing was sent
    Unchanged,
}

/// Result of removing one job
#[derive(Debug)]
pub struct Removal {
    pub job_id: String,
    /// Pid that was sent SIGTERM, if the job was running
    pub terminated: Option<u32>,
    /// Why the terminate signal failed, if it did
    pub signal_error: Option<SpoolError>,
}

/// Translates control requests into process-group signals
pub struct SignalController {
    store: Arc<dyn JobStore>,
}

impl SignalController {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Stops the job's process group and marks it paused
    pub async fn pause(&self, id: &str) -> Result<SignalOutcome> {
        let job = self.fetch(id).await?;
        let pid = running_pid(&job)?;

        if job.paused {
            debug!("Job {} is already paused", id);
            return Ok(SignalOutcome::Unchanged);
        }

        signal_job(&job.id, pid, Signal::SIGSTOP)?;
        self.store.update(&job.id, &JobUpdate::paused(true)).await?;

        info!("Job {} (PID {}) paused", job.id, pid);
        Ok(SignalOutcome::Signalled { pid })
    }

    /// Continues a stopped process group and clears the paused flag
    pub async fn resume(&self, id: &str) -> Result<SignalOutcome> {
        let job = self.fetch(id).await?;
        let pid = running_pid(&job)?;

        if !job.paused {
            debug!("Job {} is not paused", id);
            return Ok(SignalOutcome::Unchanged);
        }

        signal_job(&job.id, pid, Signal::SIGCONT)?;
        self.store.update(&job.id, &JobUpdate::paused(false)).await?;

        info!("Job {} (PID {}) resumed", job.id, pid);
        Ok(SignalOutcome::Signalled { pid })
    }

    /// Sends SIGTERM to the job's process group
    ///
    /// The stored status is left alone; the worker finalizes the job
    /// once it observes the exit.
    pub async fn kill(&self, id: &str) -> Result<SignalOutcome> {
        let job = self.fetch(id).await?;
        let pid = running_pid(&job)?;

        terminate(&job, pid)?;

        info!("Job {} (PID {}) sent SIGTERM", job.id, pid);
        Ok(SignalOutcome::Signalled { pid })
    }

    /// Terminates the job if running, then deletes its record and logs
    pub async fn remove(&self, id: &str) -> Result<Removal> {
        let job = self.fetch(id).await?;
        let removal = try_terminate(&job);

        self.store.delete(&job.id).await?;
        remove_logs(&job).await;

        info!("Job {} removed", job.id);
        Ok(removal)
    }

    /// Removes every job, terminating the running ones first
    pub async fn remove_all(&self) -> Result<Vec<Removal>> {
        let jobs = self.store.list(&JobFilter::all()).await?;

        let mut removals = Vec::with_capacity(jobs.len());
        for job in &jobs {
            removals.push(try_terminate(job));
            remove_logs(job).await;
        }

        let deleted = self.store.delete_all().await?;
        info!("Removed {} job(s)", deleted);

        Ok(removals)
    }

    async fn fetch(&self, id: &str) -> Result<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SpoolError::NotFound(id.to_string()))
    }
}

/// Sends `signal` to the process group led by `pid`
pub fn send_to_group(pid: u32, signal: Signal) -> std::result::Result<(), Errno> {
    let pgid = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    nix::sys::signal::killpg(Pid::from_raw(pgid), signal)
}

/// Whether any process in the group led by `pid` still exists
pub fn group_alive(pid: u32) -> bool {
    let Ok(pgid) = i32::try_from(pid) else {
        return false;
    };
    match nix::sys::signal::killpg(Pid::from_raw(pgid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Pid of a job whose record says it is running
fn running_pid(job: &Job) -> Result<u32> {
    match job.pid {
        Some(pid) if job.is_running() => Ok(pid),
        _ => Err(SpoolError::NoRunningProcess(job.id.clone())),
    }
}

fn signal_job(job_id: &str, pid: u32, signal: Signal) -> Result<()> {
    send_to_group(pid, signal).map_err(|source| SpoolError::Signal {
        job_id: job_id.to_string(),
        pid,
        source,
    })
}

/// SIGTERM, plus SIGCONT for a stopped group so it can act on it
fn terminate(job: &Job, pid: u32) -> Result<()> {
    signal_job(&job.id, pid, Signal::SIGTERM)?;
    if job.paused {
        if let Err(e) = signal_job(&job.id, pid, Signal::SIGCONT) {
            warn!("{}", e);
        }
    }
    Ok(())
}

/// Best-effort termination ahead of removal
fn try_terminate(job: &Job) -> Removal {
    let mut removal = Removal {
        job_id: job.id.clone(),
        terminated: None,
        signal_error: None,
    };

    if let Ok(pid) = running_pid(job) {
        match terminate(job, pid) {
            Ok(()) => {
                info!("Sent SIGTERM to job {} (PID {})", job.id, pid);
                removal.terminated = Some(pid);
            }
            Err(e) => {
                warn!("{}", e);
                removal.signal_error = Some(e);
            }
        }
    }

    removal
}

async fn remove_logs(job: &Job) {
    for path in [&job.out_file, &job.err_file] {
        remove_file(path).await;
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestEnv, queued_job};
    use std::process::Stdio;
    use tspool_core::domain::job::{JobStatus, local_now};

    /// Spawns `sleep` as its own group leader and records it as running
    async fn running_job(env: &TestEnv) -> (Job, tokio::process::Child) {
        let job = queued_job(env, "sleep 30").await;
        std::fs::write(&job.out_file, "out").unwrap();
        std::fs::write(&job.err_file, "err").unwrap();

        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        env.store
            .update(&job.id, &JobUpdate::started(pid, local_now()))
            .await
            .unwrap();

        let job = env.store.get(&job.id).await.unwrap().unwrap();
        (job, child)
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;
        let pid = job.pid.unwrap();

        assert_eq!(
            controller.pause(&job.id).await.unwrap(),
            SignalOutcome::Signalled { pid }
        );
        let stored = env.store.get(&job.id).await.unwrap().unwrap();
        assert!(stored.paused);
        assert_eq!(stored.status, JobStatus::Running);

        assert_eq!(
            controller.pause(&job.id).await.unwrap(),
            SignalOutcome::Unchanged
        );

        assert_eq!(
            controller.resume(&job.id).await.unwrap(),
            SignalOutcome::Signalled { pid }
        );
        assert!(!env.store.get(&job.id).await.unwrap().unwrap().paused);

        assert_eq!(
            controller.resume(&job.id).await.unwrap(),
            SignalOutcome::Unchanged
        );

        child.kill().await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_without_process() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let job = queued_job(&env, "true").await;

        let err = controller.pause(&job.id).await.unwrap_err();
        assert!(matches!(err, SpoolError::NoRunningProcess(_)));
        assert!(!env.store.get(&job.id).await.unwrap().unwrap().paused);

        let err = controller.kill(&job.id).await.unwrap_err();
        assert!(matches!(err, SpoolError::NoRunningProcess(_)));
    }

    #[tokio::test]
    async fn test_pause_failure_leaves_flag_unchanged() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;

        child.kill().await.unwrap();
        child.wait().await.unwrap();

        let err = controller.pause(&job.id).await.unwrap_err();
        assert!(matches!(err, SpoolError::Signal { .. }));
        assert!(!env.store.get(&job.id).await.unwrap().unwrap().paused);
    }

    #[tokio::test]
    async fn test_kill_terminates_but_keeps_status() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;

        controller.kill(&job.id).await.unwrap();

        let status = child.wait().await.unwrap();
        assert!(!status.success());
        let stored = env.store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_kill_paused_job() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;

        controller.pause(&job.id).await.unwrap();
        controller.kill(&job.id).await.unwrap();

        let status = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait())
            .await
            .expect("stopped job did not exit after kill")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());

        assert!(controller.pause("nope").await.unwrap_err().is_not_found());
        assert!(controller.remove("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_running_job() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;

        let removal = controller.remove(&job.id).await.unwrap();

        assert_eq!(removal.terminated, job.pid);
        assert!(removal.signal_error.is_none());
        assert!(env.store.get(&job.id).await.unwrap().is_none());
        assert!(!job.out_file.exists());
        assert!(!job.err_file.exists());
        assert!(!child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_remove_after_process_exited() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (job, mut child) = running_job(&env).await;

        child.kill().await.unwrap();
        child.wait().await.unwrap();

        let removal = controller.remove(&job.id).await.unwrap();
        assert!(removal.terminated.is_none());
        assert!(matches!(removal.signal_error, Some(SpoolError::Signal { .. })));
        assert!(env.store.get(&job.id).await.unwrap().is_none());
        assert!(!job.out_file.exists());
        assert!(!job.err_file.exists());
    }

    #[tokio::test]
    async fn test_remove_all() {
        let env = TestEnv::new().await;
        let controller = SignalController::new(env.store.clone());
        let (running, mut child) = running_job(&env).await;
        let queued = queued_job(&env, "echo later").await;
        std::fs::write(&queued.out_file, "x").unwrap();

        let removals = controller.remove_all().await.unwrap();

        assert_eq!(removals.len(), 2);
        let signalled: Vec<_> = removals.iter().filter_map(|r| r.terminated).collect();
        assert_eq!(signalled, vec![running.pid.unwrap()]);
        assert!(env.store.list(&JobFilter::all()).await.unwrap().is_empty());
        assert!(!running.out_file.exists());
        assert!(!queued.out_file.exists());
        assert!(!child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_group_alive() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        assert!(group_alive(pid));
        send_to_group(pid, Signal::SIGKILL).unwrap();
        child.wait().await.unwrap();
        assert!(!group_alive(pid));
    }
}
