//! In-flight job table
//!
//! Tracks which jobs this worker has admitted and which GPU ids they hold.
//! Lives only in the worker's memory; after a restart it is rebuilt from
//! the store by orphan recovery.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::warn;

/// Admission bookkeeping shared by the poll loop and every job task
#[derive(Debug, Default)]
pub struct Reservations {
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    /// job id -> reserved gpu
    in_flight: HashMap<String, Option<String>>,
    /// gpu -> job id
    gpus: HashMap<String, String>,
}

/// Point-in-time copy of the table taken at the start of a poll cycle
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub in_flight: usize,
    pub job_ids: HashSet<String>,
    pub gpus: HashSet<String>,
}

impl Reservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        let table = self.table.lock().unwrap();
        Snapshot {
            in_flight: table.in_flight.len(),
            job_ids: table.in_flight.keys().cloned().collect(),
            gpus: table.gpus.keys().cloned().collect(),
        }
    }

    /// Claims a slot (and the gpu, if any) for `job_id`
    ///
    /// Returns `false` without changing anything if the job is already
    /// tracked or the gpu is held by another job.
    pub fn reserve(&self, job_id: &str, gpu: Option<&str>) -> bool {
        let mut table = self.table.lock().unwrap();

        if table.in_flight.contains_key(job_id) {
            return false;
        }
        if let Some(gpu) = gpu {
            if let Some(holder) = table.gpus.get(gpu) {
                warn!("GPU {} already reserved by job {}", gpu, holder);
                return false;
            }
            table.gpus.insert(gpu.to_string(), job_id.to_string());
        }
        table
            .in_flight
            .insert(job_id.to_string(), gpu.map(str::to_string));
        true
    }

    /// Frees the slot and gpu held by `job_id`
    pub fn release(&self, job_id: &str) {
        let mut table = self.table.lock().unwrap();

        if let Some(Some(gpu)) = table.in_flight.remove(job_id) {
            if table.gpus.get(&gpu).is_some_and(|holder| holder == job_id) {
                table.gpus.remove(&gpu);
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.table.lock().unwrap().in_flight.len()
    }

    /// Job currently holding `gpu`
    pub fn gpu_holder(&self, gpu: &str) -> Option<String> {
        self.table.lock().unwrap().gpus.get(gpu).cloned()
    }
}
