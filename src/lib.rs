//! IVR harness - end-to-end tests for voice flows
//!
//! A conversation is described as an observation graph, submitted to a
//! remote execution backend, polled until it finishes and classified into a
//! per-observation verdict.

pub mod backend;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod common;
pub mod driver;
pub mod graph;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use driver::{ExecutionDriver, ExecutionHandle, ExecutionStatus, PollPolicy};
pub use graph::{Action, Observation, ObservationGraph};
