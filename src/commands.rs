//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a test suite against its target flow
    Run {
        /// Path to the YAML test suite
        suite: PathBuf,

        /// Only run these scenarios (repeatable)
        #[arg(long)]
        only: Vec<String>,

        /// Seconds to wait before each status query
        #[arg(long)]
        interval: Option<u64>,

        /// Status queries before a scenario times out
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Print the suite report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// Check suite graphs locally without contacting the backend
    Validate {
        /// Path to the YAML test suite
        suite: PathBuf,
    },

    /// Print the test-content document submitted for a scenario
    Render {
        /// Path to the YAML test suite
        suite: PathBuf,

        /// Scenario name
        scenario: String,
    },

    /// Query the status of an existing execution
    Status {
        /// Test case identifier
        test_case_id: String,

        /// Execution identifier
        execution_id: String,

        /// Instance hosting the test case (default: from config)
        #[arg(long)]
        instance_id: Option<String>,
    },

    /// Classify the records of an existing execution
    Records {
        /// Test case identifier
        test_case_id: String,

        /// Execution identifier
        execution_id: String,

        /// Instance hosting the test case (default: from config)
        #[arg(long)]
        instance_id: Option<String>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },
}
