//! Job Repository
//!
//! Handles all database operations related to jobs.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::{Path, PathBuf};
use tspool_core::domain::job::{Job, JobStatus, log_paths};
use tspool_core::dto::job::{JobFilter, JobOrder, JobUpdate};

use crate::db;
use crate::error::{Result, StoreError};

const JOB_COLUMNS: &str = "id, command, status, created_at, started_at, finished_at, rc, \
                           out_file, err_file, cwd, pid, priority, paused, gpu";

/// Persistence interface for job records
///
/// Each call is atomic on its own; nothing more is guaranteed. The worker
/// and any number of CLI invocations may use the same store concurrently.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Lists jobs matching `filter`, in the filter's order
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Fetches one job by exact id
    async fn get(&self, id: &str) -> Result<Option<Job>>;

    /// Applies a field-set to one job
    ///
    /// Returns `false` when no job with this id exists.
    async fn update(&self, id: &str, update: &JobUpdate) -> Result<bool>;

    /// Deletes one job record, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Deletes every job record, returning how many were removed
    async fn delete_all(&self) -> Result<u64>;

    /// Directory holding the per-job log sinks
    fn out_dir(&self) -> &Path;
}

/// SQLite implementation of JobStore
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
    out_dir: PathBuf,
}

impl SqliteJobStore {
    /// Opens (creating if needed) the database and the output directory
    ///
    /// # Arguments
    /// * `db_path` - SQLite database file
    /// * `out_dir` - Directory for job stdout/stderr files
    pub async fn open(db_path: &Path, out_dir: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::create_dir_all(out_dir).await?;

        let pool = db::create_pool(db_path).await?;
        db::run_migrations(&pool).await?;

        tracing::debug!("Opened job store at {}", db_path.display());

        Ok(Self {
            pool,
            out_dir: out_dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, command, status, created_at, started_at, finished_at, rc,
                              out_file, err_file, cwd, pid, priority, paused, gpu)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.status.as_str())
        .bind(format_time(&job.created_at))
        .bind(job.started_at.as_ref().map(format_time))
        .bind(job.finished_at.as_ref().map(format_time))
        .bind(job.rc)
        .bind(job.out_file.to_string_lossy().into_owned())
        .bind(job.err_file.to_string_lossy().into_owned())
        .bind(&job.cwd)
        .bind(job.pid.map(i64::from))
        .bind(job.priority)
        .bind(job.paused)
        .bind(&job.gpu)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM jobs", JOB_COLUMNS));

        let mut has_where = false;
        if let Some(status) = filter.status {
            qb.push(" WHERE status = ").push_bind(status.as_str());
            has_where = true;
        }
        if let Some(paused) = filter.paused {
            qb.push(if has_where { " AND " } else { " WHERE " });
            qb.push("COALESCE(paused, 0) = ").push_bind(paused);
        }

        // created_at carries the submitter's local offset; order by instant
        qb.push(match filter.order {
            JobOrder::Created => " ORDER BY julianday(created_at) ASC, rowid ASC",
            JobOrder::Admission => {
                " ORDER BY COALESCE(priority, 0) DESC, julianday(created_at) ASC, rowid ASC"
            }
        });

        let rows = qb
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.into_job(&self.out_dir))
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_job(&self.out_dir)).transpose()
    }

    async fn update(&self, id: &str, update: &JobUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(self.get(id).await?.is_some());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE jobs SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(status) = update.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
            }
            if let Some(at) = &update.started_at {
                set.push("started_at = ").push_bind_unseparated(format_time(at));
            }
            if let Some(at) = &update.finished_at {
                set.push("finished_at = ").push_bind_unseparated(format_time(at));
            }
            if let Some(rc) = update.rc {
                set.push("rc = ").push_bind_unseparated(rc);
            }
            if let Some(pid) = update.pid {
                set.push("pid = ").push_bind_unseparated(pid.map(i64::from));
            }
            if let Some(paused) = update.paused {
                set.push("paused = ").push_bind_unseparated(paused);
            }
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM jobs")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn format_time(at: &DateTime<FixedOffset>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn parse_time(id: &str, column: &str, value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| StoreError::corrupt(id, format!("{} '{}': {}", column, value, e)))
}

fn parse_optional_time(
    id: &str,
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<FixedOffset>>> {
    value.map(|v| parse_time(id, column, &v)).transpose()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    command: String,
    status: String,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    rc: Option<i32>,
    out_file: Option<String>,
    err_file: Option<String>,
    cwd: Option<String>,
    pid: Option<i64>,
    priority: Option<i32>,
    paused: Option<bool>,
    gpu: Option<String>,
}

impl JobRow {
    fn into_job(self, out_dir: &Path) -> Result<Job> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::corrupt(&self.id, e.to_string()))?;

        let pid = self
            .pid
            .map(u32::try_from)
            .transpose()
            .map_err(|_| StoreError::corrupt(&self.id, "pid out of range"))?;

        let (default_out, default_err) = log_paths(out_dir, &self.id);

        Ok(Job {
            created_at: parse_time(&self.id, "created_at", &self.created_at)?,
            started_at: parse_optional_time(&self.id, "started_at", self.started_at)?,
            finished_at: parse_optional_time(&self.id, "finished_at", self.finished_at)?,
            out_file: self.out_file.map(PathBuf::from).unwrap_or(default_out),
            err_file: self.err_file.map(PathBuf::from).unwrap_or(default_err),
            id: self.id,
            command: self.command,
            status,
            rc: self.rc,
            cwd: self.cwd,
            pid,
            priority: self.priority.unwrap_or(0),
            paused: self.paused.unwrap_or(false),
            gpu: self.gpu,
        })
    }
}
