//! Scenario suites
//!
//! Reads YAML suites describing conversations as observation graphs and
//! runs them one by one against a single target flow.

mod config;
pub mod report;
mod runner;

pub use config::*;
pub use runner::{
    RunnerConfig, Scenario, ScenarioOutcome, ScenarioResult, ScenarioStatus, SuiteObserver,
    SuitePolicy, SuiteReport, SuiteRunner,
};
