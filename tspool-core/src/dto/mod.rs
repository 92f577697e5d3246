//! Data transfer objects
//!
//! Requests and field-sets exchanged between the CLI, the runner and the store.

pub mod job;
