//! Worker configuration
//!
//! Defines all configurable parameters for the spooler including
//! store locations, the concurrency limit and the poll interval.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device selector injected into jobs pinned to a GPU
pub const DEFAULT_GPU_ENV_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// Spooler configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database holding the job records
    pub db_path: PathBuf,

    /// Directory for per-job stdout/stderr files
    pub out_dir: PathBuf,

    /// Max jobs running at once
    pub max_parallel_jobs: usize,

    /// How often the scheduler looks for queued jobs
    pub poll_interval: Duration,

    /// Environment variable naming the reserved GPU
    pub gpu_env_var: String,

    /// Shell used to run job commands (invoked with `-c`)
    pub shell: PathBuf,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(db_path: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            db_path,
            out_dir,
            max_parallel_jobs: 1,
            poll_interval: Duration::from_secs(2),
            gpu_env_var: DEFAULT_GPU_ENV_VAR.to_string(),
            shell: PathBuf::from("/bin/sh"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - TSPOOL_DB (default: ~/.tspool_queue.db)
    /// - TSPOOL_OUT_DIR (default: ~/.tspool_out)
    /// - TSPOOL_POLL_INTERVAL (seconds, default: 2)
    /// - TSPOOL_GPU_ENV (default: CUDA_VISIBLE_DEVICES)
    /// - TSPOOL_SHELL (default: /bin/sh)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("TSPOOL_DB") {
            config.db_path = expand_home(&path);
        }

        if let Ok(path) = std::env::var("TSPOOL_OUT_DIR") {
            config.out_dir = expand_home(&path);
        }

        if let Some(secs) = std::env::var("TSPOOL_POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Ok(var) = std::env::var("TSPOOL_GPU_ENV") {
            config.gpu_env_var = var;
        }

        if let Ok(shell) = std::env::var("TSPOOL_SHELL") {
            config.shell = PathBuf::from(shell);
        }

        config
    }

    /// Sets the concurrency limit
    pub fn with_parallel_jobs(mut self, jobs: usize) -> Self {
        self.max_parallel_jobs = jobs;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.gpu_env_var.is_empty() || self.gpu_env_var.contains('=') {
            anyhow::bail!("gpu_env_var must be a valid environment variable name");
        }

        if self.shell.as_os_str().is_empty() {
            anyhow::bail!("shell cannot be empty");
        }

        if self.db_path.as_os_str().is_empty() {
            anyhow::bail!("db_path cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            home_dir().join(".tspool_queue.db"),
            home_dir().join(".tspool_out"),
        )
    }
}

/// Expands a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }

    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}
