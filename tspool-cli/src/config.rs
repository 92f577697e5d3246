//! Configuration module
//!
//! Combines global CLI flags with the spooler's environment configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use tspool_runner::config::expand_home;
use tspool_store::{JobStore, SqliteJobStore};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Spooler settings (store paths, worker tuning)
    pub spool: tspool_runner::Config,
}

impl Config {
    /// Builds the configuration, letting flags override the environment
    pub fn new(db: Option<String>, out_dir: Option<String>) -> Self {
        let mut spool = tspool_runner::Config::from_env();

        if let Some(db) = db {
            spool.db_path = expand_home(&db);
        }
        if let Some(out_dir) = out_dir {
            spool.out_dir = expand_home(&out_dir);
        }

        Self { spool }
    }

    /// Opens the shared job store
    pub async fn open_store(&self) -> Result<Arc<dyn JobStore>> {
        let store = SqliteJobStore::open(&self.spool.db_path, &self.spool.out_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to open job store at {}",
                    self.spool.db_path.display()
                )
            })?;

        Ok(Arc::new(store))
    }
}
