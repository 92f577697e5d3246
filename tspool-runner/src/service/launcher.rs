//! Process launcher
//!
//! Runs one admitted job to completion:
//! - Resolving the working directory and environment
//! - Truncating the stdout/stderr log sinks
//! - Spawning the command through the shell as a process group leader
//! - Persisting the pid as soon as the process exists
//! - Waiting for exit and reporting the exit code

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};
use tspool_core::domain::job::{Job, local_now};
use tspool_core::dto::job::JobUpdate;
use tspool_store::JobStore;

use crate::config::{Config, expand_home};
use crate::error::{Result, SpoolError};
use crate::service::signal::{self, Signal};

/// Exit code recorded when the process could not be created
pub const SPAWN_FAILURE_RC: i32 = 1;

/// Spawns job commands and blocks until they exit
pub struct ProcessLauncher {
    store: Arc<dyn JobStore>,
    shell: std::path::PathBuf,
    gpu_env_var: String,
}

impl ProcessLauncher {
    /// Creates a launcher persisting pids to `store`
    pub fn new(config: &Config, store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            shell: config.shell.clone(),
            gpu_env_var: config.gpu_env_var.clone(),
        }
    }

    /// Executes `job` and returns its exit code
    ///
    /// Never fails: spawn errors are written to the job's error log and
    /// reported as `SPAWN_FAILURE_RC`.
    pub async fn run(&self, job: &Job) -> i32 {
        let mut child = match self.spawn(job).await {
            Ok(child) => child,
            Err(e) => {
                error!("{}", e);
                self.record_spawn_failure(job, &e).await;
                return SPAWN_FAILURE_RC;
            }
        };

        match child.id() {
            Some(pid) => self.mark_running(job, pid).await,
            None => warn!("Job {} exited before its pid was observed", job.id),
        }

        match child.wait().await {
            Ok(status) => {
                let rc = exit_code(status);
                debug!("Job {} process exited with {}", job.id, status);
                rc
            }
            Err(e) => {
                error!("Failed to wait for job {}: {}", job.id, e);
                SPAWN_FAILURE_RC
            }
        }
    }

    async fn spawn(&self, job: &Job) -> Result<Child> {
        let spawn_error = |source: std::io::Error| SpoolError::Spawn {
            job_id: job.id.clone(),
            source,
        };

        let stdout = tokio::fs::File::create(&job.out_file)
            .await
            .map_err(spawn_error)?
            .into_std()
            .await;
        let stderr = tokio::fs::File::create(&job.err_file)
            .await
            .map_err(spawn_error)?
            .into_std()
            .await;

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0);

        if let Some(cwd) = &job.cwd {
            command.current_dir(expand_home(cwd));
        }

        if let Some(gpu) = &job.gpu {
            command.env(&self.gpu_env_var, gpu);
        }

        let child = command.spawn().map_err(spawn_error)?;

        info!(
            "Started job {} (PID {}, {}): {}",
            job.id,
            child.id().unwrap_or_default(),
            job.device_label(),
            job.command
        );

        Ok(child)
    }

    /// Persists the queued -> running transition with the new pid
    async fn mark_running(&self, job: &Job, pid: u32) {
        match self
            .store
            .update(&job.id, &JobUpdate::started(pid, local_now()))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Job {} was removed while starting; terminating PID {}",
                    job.id, pid
                );
                if let Err(e) = signal::send_to_group(pid, Signal::SIGTERM) {
                    warn!("Failed to terminate PID {}: {}", pid, e);
                }
            }
            Err(e) => error!("Failed to record PID {} for job {}: {}", pid, job.id, e),
        }
    }

    async fn record_spawn_failure(&self, job: &Job, err: &SpoolError) {
        if let Err(e) = tokio::fs::write(&job.out_file, b"").await {
            debug!("Could not reset stdout log for job {}: {}", job.id, e);
        }
        let diagnostic = format!("Failed to run job: {}\n", err);
        if let Err(e) = tokio::fs::write(&job.err_file, diagnostic).await {
            warn!("Could not write error log for job {}: {}", job.id, e);
        }
    }
}

/// Exit code for a finished process; signal deaths map to `-signal`
pub fn exit_code(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => status.signal().map(|sig| -sig).unwrap_or(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestEnv, queued_job};
    use tspool_core::domain::job::JobStatus;

    #[tokio::test]
    async fn test_run_captures_exit_code_and_output() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());

        let job = queued_job(&env, "echo out; echo err >&2; exit 3").await;
        let rc = launcher.run(&job).await;

        assert_eq!(rc, 3);
        assert_eq!(std::fs::read_to_string(&job.out_file).unwrap(), "out\n");
        assert_eq!(std::fs::read_to_string(&job.err_file).unwrap(), "err\n");

        let stored = env.store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.pid.is_some());
        assert!(stored.started_at.is_some());
    }

    #[tokio::test]
    async fn test_gpu_env_is_injected() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());

        let mut job = queued_job(&env, "printf %s \"$CUDA_VISIBLE_DEVICES\"").await;
        job.gpu = Some("3".to_string());
        assert_eq!(launcher.run(&job).await, 0);
        assert_eq!(std::fs::read_to_string(&job.out_file).unwrap(), "3");
    }

    #[tokio::test]
    async fn test_cwd_override() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());
        let workdir = env.dir.path().join("work");
        std::fs::create_dir(&workdir).unwrap();

        let mut job = queued_job(&env, "pwd").await;
        job.cwd = Some(workdir.to_string_lossy().into_owned());
        assert_eq!(launcher.run(&job).await, 0);

        let printed = std::fs::read_to_string(&job.out_file).unwrap();
        assert_eq!(
            std::fs::canonicalize(printed.trim()).unwrap(),
            std::fs::canonicalize(&workdir).unwrap()
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_is_logged() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());

        let mut job = queued_job(&env, "true").await;
        job.cwd = Some("/definitely/not/a/dir".to_string());
        assert_eq!(launcher.run(&job).await, SPAWN_FAILURE_RC);

        let err = std::fs::read_to_string(&job.err_file).unwrap();
        assert!(err.starts_with("Failed to run job:"));
        let stored = env.store.get(&job.id).await.unwrap().unwrap();
        assert!(stored.pid.is_none());
    }

    #[tokio::test]
    async fn test_logs_are_truncated_on_start() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());

        let job = queued_job(&env, "true").await;
        std::fs::write(&job.out_file, "stale output").unwrap();
        assert_eq!(launcher.run(&job).await, 0);
        assert_eq!(std::fs::read_to_string(&job.out_file).unwrap(), "");
    }

    #[tokio::test]
    async fn test_signal_death_is_negative() {
        let env = TestEnv::new().await;
        let launcher = ProcessLauncher::new(&env.config, env.store.clone());

        let job = queued_job(&env, "kill -9 $$").await;
        assert_eq!(launcher.run(&job).await, -9);
    }
}
