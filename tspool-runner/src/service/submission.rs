//! Job submission

use tracing::info;
use tspool_core::domain::job::Job;
use tspool_core::dto::job::NewJob;
use tspool_store::JobStore;

use crate::error::{Result, SpoolError};

/// Validates `req` and enqueues it as a new job
pub async fn submit(store: &dyn JobStore, req: NewJob) -> Result<Job> {
    let req = validate(req)?;
    let job = Job::new(req, store.out_dir());

    store.insert(&job).await?;

    info!(
        "Job {} queued (priority {}, {}): {}",
        job.id,
        job.priority,
        job.device_label(),
        job.command
    );

    Ok(job)
}

fn validate(mut req: NewJob) -> Result<NewJob> {
    if req.command.trim().is_empty() {
        return Err(SpoolError::Submission("command cannot be empty".to_string()));
    }

    if let Some(gpu) = req.gpu.take() {
        let gpu = gpu.trim();
        if gpu.is_empty() {
            return Err(SpoolError::Submission("gpu id cannot be empty".to_string()));
        }
        req.gpu = Some(gpu.to_string());
    }

    req.cwd = req.cwd.filter(|cwd| !cwd.trim().is_empty());

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;
    use tspool_core::domain::job::JobStatus;
    use tspool_core::dto::job::JobFilter;

    #[tokio::test]
    async fn test_submit_queues_job() {
        let env = TestEnv::new().await;

        let job = submit(
            env.store.as_ref(),
            NewJob {
                command: "python train.py".to_string(),
                cwd: Some("~/proj".to_string()),
                priority: 5,
                gpu: Some(" 1 ".to_string()),
            },
        )
        .await
        .unwrap();

        let stored = env.store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
        assert_eq!(stored.priority, 5);
        assert_eq!(stored.gpu.as_deref(), Some("1"));
        assert_eq!(stored.cwd.as_deref(), Some("~/proj"));
        assert_eq!(stored.out_file, env.config.out_dir.join(format!("{}.out", job.id)));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let env = TestEnv::new().await;

        let err = submit(
            env.store.as_ref(),
            NewJob {
                command: "   ".to_string(),
                ..NewJob::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SpoolError::Submission(_)));
        assert!(env.store.list(&JobFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_gpu_is_rejected() {
        let env = TestEnv::new().await;

        let err = submit(
            env.store.as_ref(),
            NewJob {
                command: "true".to_string(),
                gpu: Some(String::new()),
                ..NewJob::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SpoolError::Submission(_)));
    }
}
