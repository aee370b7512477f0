//! # Dealflow
//!
//! Runs a complete demonstration workflow against a decentralized
//! compute-marketplace CLI: submit an ask-plan, wait for its order, submit a
//! bid, form a deal (explicitly or by auto-matching), verify it, start a task
//! inside it, observe the task, and stop it.
//!
//! The crate is structured around an explicit process-execution abstraction
//! ([`subprocess::ProcessRunner`]) so the whole workflow can be exercised
//! against a mock runner without ever invoking the real marketplace binary.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod poll;
pub mod subprocess;
pub mod workflow;

pub use error::{Error, Result};
