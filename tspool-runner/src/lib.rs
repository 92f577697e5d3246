//! tspool Runner
//!
//! The scheduling and execution engine of the spooler.
//!
//! Architecture:
//! - Configuration: store locations, concurrency limit, poll interval
//! - Scheduler: the poll loop, admission policy and in-memory reservations
//! - Services: process launching, status finalization, signal control
//!   and submission
//!
//! A worker process runs one `JobPoller`. Every other operation works
//! directly against the shared job store and can run from any process.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Result, SpoolError};
pub use scheduler::JobPoller;
pub use service::{SignalController, SignalOutcome};
