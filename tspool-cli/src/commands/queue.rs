//! Queue command handlers
//!
//! Handles submitting, listing, inspecting and removing jobs.

use anyhow::{Context, Result};
use colored::*;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tspool_core::domain::job::{Job, JobStatus};
use tspool_core::dto::job::{JobFilter, NewJob};
use tspool_runner::SignalController;
use tspool_runner::service::{Removal, submit};
use tspool_store::JobStore;

use crate::id_resolver::resolve_job_id;

/// Which log sink to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Enqueue a command
pub async fn add_job(
    store: &dyn JobStore,
    cmd: String,
    cwd: Option<String>,
    priority: i32,
    gpu: Option<String>,
) -> Result<()> {
    let job = submit(
        store,
        NewJob {
            command: cmd,
            cwd,
            priority,
            gpu,
        },
    )
    .await?;

    println!(
        "Job {} added (priority {}, {}).",
        job.id.cyan(),
        job.priority,
        job.device_label()
    );
    println!("  Output log: {}", job.out_file.display());
    println!("  Error log:  {}", job.err_file.display());

    Ok(())
}

/// Print every job, oldest first
pub async fn list_jobs(store: &dyn JobStore, json: bool) -> Result<()> {
    let jobs = store
        .list(&JobFilter::all())
        .await
        .context("Failed to list jobs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    println!("{}", header_row().bold());
    for job in &jobs {
        print_job_row(job);
    }

    Ok(())
}

/// Print the contents of a job's stdout or stderr file
pub async fn show_log(store: &dyn JobStore, id: &str, stream: LogStream) -> Result<()> {
    let id = resolve_job_id(store, id).await?;
    let job = store
        .get(&id)
        .await?
        .with_context(|| format!("No such job: {}", id))?;

    let path = match stream {
        LogStream::Stdout => &job.out_file,
        LogStream::Stderr => &job.err_file,
    };

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            print!("{}", contents);
            io::stdout().flush()?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            println!("{}", "(No output yet)".dimmed());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    }

    Ok(())
}

/// Remove one job, or all of them
pub async fn remove(
    store: Arc<dyn JobStore>,
    id: Option<&str>,
    all: bool,
    force: bool,
) -> Result<()> {
    let controller = SignalController::new(Arc::clone(&store));

    if all {
        if !force && !confirm("Are you sure you want to remove ALL jobs and their logs? [y/N]: ")? {
            println!("Aborted.");
            return Ok(());
        }

        let removals = controller.remove_all().await?;
        for removal in &removals {
            report_termination(removal);
        }
        println!(
            "{}",
            format!("All jobs ({}) and their logs have been removed.", removals.len()).green()
        );
        return Ok(());
    }

    let Some(id) = id else {
        anyhow::bail!("Specify a job ID or --all.");
    };
    let id = resolve_job_id(store.as_ref(), id).await?;

    let removal = controller.remove(&id).await?;
    report_termination(&removal);
    println!("Job {} removed.", removal.job_id.cyan());

    Ok(())
}

fn report_termination(removal: &Removal) {
    if let Some(pid) = removal.terminated {
        println!("Sent SIGTERM to job {} (PID {})", removal.job_id, pid);
    }
    if let Some(e) = &removal.signal_error {
        println!("{}", format!("Failed to kill process: {}", e).yellow());
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn header_row() -> String {
    format!(
        "{:<8} {:<8} {:<3} {:<4} {:<6} {:<7} {:<5} {:<19} {:<19} {:<19} {:<16} {}",
        "ID", "STATUS", "PRI", "RC", "PAUSED", "PID", "GPU", "CREATED", "STARTED", "FINISHED",
        "CWD", "COMMAND"
    )
}

/// One table row, without colour
fn format_job_row(job: &Job) -> String {
    let time = |t: Option<chrono::DateTime<chrono::FixedOffset>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let cwd: String = job.cwd.as_deref().unwrap_or("-").chars().take(16).collect();

    format!(
        "{:<8} {:<8} {:<3} {:<4} {:<6} {:<7} {:<5} {:<19} {:<19} {:<19} {:<16} {}",
        job.id,
        job.status,
        job.priority,
        job.rc.map(|rc| rc.to_string()).unwrap_or_else(|| "-".to_string()),
        if job.paused { "yes" } else { "no" },
        job.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        job.gpu.as_deref().unwrap_or("CPU"),
        time(Some(job.created_at)),
        time(job.started_at),
        time(job.finished_at),
        cwd,
        job.command
    )
}

fn print_job_row(job: &Job) {
    let row = format_job_row(job);
    let row = match job.status {
        JobStatus::Queued => row.yellow(),
        JobStatus::Running if job.paused => row.magenta(),
        JobStatus::Running => row.cyan(),
        JobStatus::Done => row.green(),
        JobStatus::Failed => row.red(),
    };
    println!("{}", row);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn sample_job() -> Job {
        Job::new(
            NewJob {
                command: "python train.py --epochs 3".to_string(),
                cwd: Some("/a/very/long/working/directory".to_string()),
                priority: 2,
                gpu: Some("1".to_string()),
            },
            Path::new("/tmp"),
        )
    }

    #[test]
    fn test_format_queued_row() {
        let job = sample_job();
        let row = format_job_row(&job);

        assert!(row.starts_with(&job.id));
        assert!(row.contains("queued"));
        assert!(row.contains(" 1 "));
        assert!(row.contains("/a/very/long/wor "));
        assert!(row.ends_with("python train.py --epochs 3"));
    }

    #[test]
    fn test_format_finished_row() {
        let mut job = sample_job();
        job.status = JobStatus::Failed;
        job.rc = Some(3);
        job.gpu = None;
        job.finished_at = Some(job.created_at);

        let row = format_job_row(&job);
        assert!(row.contains("failed"));
        assert!(row.contains(" 3 "));
        assert!(row.contains("CPU"));
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes("YES"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }
}
