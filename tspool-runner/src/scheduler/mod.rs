//! Scheduler layer
//!
//! This layer decides which queued jobs run and when. It owns the
//! in-memory reservation table and the poll loop that fills it.

pub mod poller;
pub mod recovery;
pub mod reservations;

pub use poller::{JobPoller, plan_admissions};
pub use recovery::{ORPHAN_RC, RecoveryReport};
pub use reservations::{Reservations, Snapshot};
