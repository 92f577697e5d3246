//! Service layer
//!
//! Services contain the execution and control logic of the spooler.
//! The poll loop drives the launcher and tracker; the signal controller
//! and submission are called directly by the CLI.

mod launcher;
pub mod signal;
mod submission;
mod tracker;

pub use launcher::{ProcessLauncher, SPAWN_FAILURE_RC, exit_code};
pub use signal::{Removal, SignalController, SignalOutcome};
pub use submission::submit;
pub use tracker::StatusTracker;
