//! tspool Core
//!
//! Core types shared by every tspool crate.
//!
//! This crate contains:
//! - Domain types: the `Job` record and its status state machine
//! - DTOs: submission requests, store filters and partial updates

pub mod domain;
pub mod dto;
