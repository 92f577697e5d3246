//! tspool Store
//!
//! Durable job records backed by SQLite.
//!
//! The store is shared by independent processes (the submitting CLI and
//! the worker), so every operation is a single statement and atomic on
//! its own. Callers that read and then write do so without isolation.

pub mod db;
pub mod error;
pub mod repository;

pub use error::{Result, StoreError};
pub use repository::{JobStore, SqliteJobStore};
