use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Columns added after the first schema; applied to older databases
const ADDED_COLUMNS: &[&str] = &[
    "ALTER TABLE jobs ADD COLUMN pid INTEGER",
    "ALTER TABLE jobs ADD COLUMN priority INTEGER DEFAULT 0",
    "ALTER TABLE jobs ADD COLUMN paused INTEGER DEFAULT 0",
    "ALTER TABLE jobs ADD COLUMN gpu TEXT",
];

pub async fn create_pool(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            command TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT,
            rc INTEGER,
            out_file TEXT,
            err_file TEXT,
            cwd TEXT,
            pid INTEGER,
            priority INTEGER DEFAULT 0,
            paused INTEGER DEFAULT 0,
            gpu TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in ADDED_COLUMNS {
        match sqlx::query(stmt).execute(pool).await {
            Ok(_) => tracing::info!("Applied migration: {}", stmt),
            Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column") => {}
            Err(e) => return Err(e),
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    tracing::debug!("Database migrations completed successfully");
    Ok(())
}
