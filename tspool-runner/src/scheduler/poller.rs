//! Job poller
//!
//! Polls the store for queued jobs on a fixed interval and admits them
//! under the concurrency limit and GPU exclusivity. Each admitted job runs
//! in its own task that launches the process, waits for it and finalizes
//! the record; the poll loop itself never waits on a job.

use std::sync::Arc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tspool_core::domain::job::Job;
use tspool_core::dto::job::JobFilter;
use tspool_store::JobStore;

use crate::config::Config;
use crate::error::Result;
use crate::scheduler::recovery;
use crate::scheduler::reservations::{Reservations, Snapshot};
use crate::service::{ProcessLauncher, StatusTracker};

/// The scheduler loop of a worker process
pub struct JobPoller {
    config: Config,
    store: Arc<dyn JobStore>,
    reservations: Arc<Reservations>,
    launcher: Arc<ProcessLauncher>,
    tracker: Arc<StatusTracker>,
}

impl JobPoller {
    /// Creates a new job poller over `store`
    pub fn new(config: Config, store: Arc<dyn JobStore>) -> Self {
        let reservations = Arc::new(Reservations::new());
        let launcher = Arc::new(ProcessLauncher::new(&config, Arc::clone(&store)));
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&store),
            Arc::clone(&reservations),
        ));

        Self {
            config,
            store,
            reservations,
            launcher,
            tracker,
        }
    }

    pub fn reservations(&self) -> &Arc<Reservations> {
        &self.reservations
    }

    /// Recovers orphans, then polls until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting job poller ({} concurrent job(s), interval: {:?})",
            self.config.max_parallel_jobs, self.config.poll_interval
        );

        recovery::recover_orphans(
            self.store.as_ref(),
            &self.reservations,
            &self.tracker,
            self.config.poll_interval,
            &shutdown,
        )
        .await?;

        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(
                        "Shutting down poller; {} job(s) still running",
                        self.reservations.in_flight()
                    );
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            match self.poll_once().await {
                Ok(started) if started > 0 => info!("Started {} job(s) this cycle", started),
                Ok(_) => {}
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        }
    }

    /// Runs one admission cycle, returning how many jobs were dispatched
    pub async fn poll_once(&self) -> Result<usize> {
        let limit = self.config.max_parallel_jobs;
        let snapshot = self.reservations.snapshot();

        if snapshot.in_flight >= limit {
            debug!("Max parallel jobs reached ({}/{})", snapshot.in_flight, limit);
            return Ok(0);
        }

        let candidates = self.store.list(&JobFilter::admissible()).await?;
        if candidates.is_empty() {
            debug!("No queued jobs");
            return Ok(0);
        }

        let mut started = 0;
        for job in plan_admissions(candidates, snapshot, limit) {
            if self.reservations.reserve(&job.id, job.gpu.as_deref()) {
                self.dispatch(job);
                started += 1;
            }
        }

        Ok(started)
    }

    /// Spawns the worker task for an admitted job
    fn dispatch(&self, job: Job) {
        let launcher = Arc::clone(&self.launcher);
        let tracker = Arc::clone(&self.tracker);

        debug!("Dispatching job {}", job.id);

        tokio::spawn(async move {
            let rc = launcher.run(&job).await;
            tracker.finalize(&job.id, rc).await;
        });
    }
}

/// Picks which candidates to admit this cycle
///
/// `candidates` must already be in admission order. A job whose gpu is
/// taken is skipped without blocking the jobs behind it; admission stops
/// once the in-flight count reaches `limit`.
pub fn plan_admissions(candidates: Vec<Job>, snapshot: Snapshot, limit: usize) -> Vec<Job> {
    let Snapshot {
        mut in_flight,
        job_ids,
        mut gpus,
    } = snapshot;

    let mut admitted = Vec::new();
    for job in candidates {
        if in_flight >= limit {
            break;
        }
        if job_ids.contains(&job.id) {
            continue;
        }
        if let Some(gpu) = &job.gpu {
            if !gpus.insert(gpu.clone()) {
                debug!("Job {} waits for GPU {}", job.id, gpu);
                continue;
            }
        }
        in_flight += 1;
        admitted.push(job);
    }

    admitted
}
