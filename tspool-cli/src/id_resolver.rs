//! ID resolver module
//!
//! Resolves job id prefixes to full job ids by querying the store.
//! This allows users to type the first few characters of an id.

use anyhow::{Context, Result, anyhow};
use tspool_core::dto::job::JobFilter;
use tspool_store::JobStore;

/// Resolve a job ID or prefix to a full job ID
///
/// An exact match wins immediately. Otherwise all jobs are fetched and
/// the one whose id starts with `input` is returned.
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - The store cannot be read
pub async fn resolve_job_id(store: &dyn JobStore, input: &str) -> Result<String> {
    let prefix = input.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    if store
        .get(&prefix)
        .await
        .context("Failed to look up job")?
        .is_some()
    {
        return Ok(prefix);
    }

    let jobs = store
        .list(&JobFilter::all())
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    let matches: Vec<_> = jobs
        .iter()
        .filter(|j| j.id.to_lowercase().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(anyhow!("No such job: {}", input)),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|j| j.id.as_str()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
