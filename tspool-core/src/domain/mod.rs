//! Core domain types
//!
//! The job record is the only entity. It is persisted by the store,
//! admitted and executed by the runner, and rendered by the CLI.

pub mod job;
