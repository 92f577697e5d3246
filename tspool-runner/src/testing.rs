//! Shared fixtures for runner tests

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tspool_core::domain::job::Job;
use tspool_core::dto::job::NewJob;
use tspool_store::{JobStore, SqliteJobStore};

use crate::config::Config;

/// Isolated store and output directory
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub store: Arc<dyn JobStore>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_parallel_jobs(1).await
    }

    pub async fn with_parallel_jobs(jobs: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new(dir.path().join("queue.db"), dir.path().join("out"))
            .with_parallel_jobs(jobs);
        config.poll_interval = Duration::from_millis(50);

        let store = SqliteJobStore::open(&config.db_path, &config.out_dir)
            .await
            .unwrap();

        Self {
            dir,
            config,
            store: Arc::new(store),
        }
    }
}

/// Inserts a queued job running `command`
pub async fn queued_job(env: &TestEnv, command: &str) -> Job {
    let job = Job::new(
        NewJob {
            command: command.to_string(),
            ..NewJob::default()
        },
        &env.config.out_dir,
    );
    env.store.insert(&job).await.unwrap();
    job
}

/// Polls the store until `done` holds for the job, or panics after 10s
pub async fn wait_for(env: &TestEnv, id: &str, done: impl Fn(&Job) -> bool) -> Job {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(job) = env.store.get(id).await.unwrap() {
                if done(&job) {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for job {}", id))
}
