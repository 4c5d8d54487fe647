//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Returns `Ok(false)`
//! when the command ran but the result should fail the process.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::backend::{ExecutionBackend, ExecutionIds, HttpBackend};
use crate::classify::classify;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::driver::{DriverPhase, ExecutionHandle, ExecutionStatus, PollPolicy};
use crate::graph::validate;
use crate::testing::report::{self, ConsoleReporter};
use crate::testing::{self, LoadedSuite, RunnerConfig, SuiteRunner};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Run {
            suite,
            only,
            interval,
            max_attempts,
            json,
            verbose,
        } => {
            let mut suite = load(&suite, config)?;
            suite.retain_only(&only)?;

            let poll = poll_policy(config, &suite, interval, max_attempts);
            tracing::info!(
                suite = %suite.name,
                scenarios = suite.scenarios.len(),
                interval_secs = poll.interval.as_secs(),
                max_attempts = poll.max_attempts,
                "Running suite"
            );

            let backend = HttpBackend::new(&config.backend)?;
            let runner = SuiteRunner::new(&backend, RunnerConfig { poll });

            let result = if json {
                runner.run_suite(&suite.scenarios, &suite.policy).await
            } else {
                println!("{} {}", "Suite:".blue().bold(), suite.name.white().bold());
                if let Some(desc) = &suite.description {
                    println!("  {}", desc.dimmed());
                }
                let mut reporter = ConsoleReporter { verbose };
                runner
                    .run_suite_with(&suite.scenarios, &suite.policy, &mut reporter)
                    .await
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                report::print_summary(&suite.name, &result);
            }
            Ok(result.all_passed())
        }

        Commands::Validate { suite } => {
            let suite = load(&suite, config)?;
            let mut ready = true;
            for scenario in &suite.scenarios {
                let validation = validate(&scenario.graph);
                if validation.is_submit_ready() {
                    println!("  {} {}", "✓".green(), scenario.name);
                } else {
                    ready = false;
                    println!("  {} {}", "✗".red(), scenario.name);
                }
                report::print_validation(&validation);
            }
            Ok(ready)
        }

        Commands::Render { suite, scenario } => {
            let suite = load(&suite, config)?;
            println!("{}", render(&suite, &scenario)?);
            Ok(true)
        }

        Commands::Status {
            test_case_id,
            execution_id,
            instance_id,
        } => {
            let ids = execution_ids(config, instance_id, test_case_id, execution_id)?;
            let backend = HttpBackend::new(&config.backend)?;
            let summary = backend.execution_summary(&ids).await?;
            let obs = summary.observation_summary;
            let status = ExecutionStatus::from(summary.status);
            println!(
                "{} | obs: {}/{} pass, {} fail{}",
                status.as_str().bold(),
                obs.observations_passed,
                obs.total_observations,
                obs.observations_failed,
                summary
                    .duration_seconds
                    .map(|d| format!(" ({d:.1}s)"))
                    .unwrap_or_default()
            );
            Ok(succeeded(status))
        }

        Commands::Records {
            test_case_id,
            execution_id,
            instance_id,
            json,
        } => {
            let ids = execution_ids(config, instance_id, test_case_id, execution_id)?;
            let backend = HttpBackend::new(&config.backend)?;
            let summary = backend.execution_summary(&ids).await?;
            let status = ExecutionStatus::from(summary.status);
            let handle = ExecutionHandle {
                ids,
                status,
                phase: if status.is_terminal() {
                    DriverPhase::Terminal
                } else {
                    DriverPhase::Polling
                },
                status_queries: 1,
                last_summary: Some(summary),
            };
            let verdict = classify(&backend, &handle).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!("{} execution {}", status.as_str().bold(), verdict.execution_id);
                report::print_observations(&verdict, true);
            }
            Ok(verdict.passed())
        }
    }
}

/// Only a passed execution counts as success, as in `run` and `records`
fn succeeded(status: ExecutionStatus) -> bool {
    status == ExecutionStatus::Passed
}

/// Test-content document for one scenario
///
/// Graphs the runner would refuse to submit are rejected.
fn render(suite: &LoadedSuite, scenario: &str) -> Result<String> {
    let scenario = suite.scenario(scenario).ok_or_else(|| {
        Error::Config(format!("Scenario '{}' not found in suite '{}'", scenario, suite.name))
    })?;
    validate(&scenario.graph).into_result()?;
    Ok(serde_json::to_string_pretty(&scenario.graph)?)
}

fn load(path: &Path, config: &Config) -> Result<LoadedSuite> {
    testing::load_suite(path, config.backend.instance_id.as_deref())
}

/// CLI flags win over the suite file, which wins over the config file
fn poll_policy(
    config: &Config,
    suite: &LoadedSuite,
    interval: Option<u64>,
    max_attempts: Option<u32>,
) -> PollPolicy {
    let interval = interval
        .or(suite.poll.interval_secs)
        .unwrap_or(config.polling.interval_secs);
    let max_attempts = max_attempts
        .or(suite.poll.max_attempts)
        .unwrap_or(config.polling.max_attempts);
    PollPolicy {
        interval: Duration::from_secs(interval),
        max_attempts,
        request_timeout: config.backend.request_timeout(),
    }
}

fn execution_ids(
    config: &Config,
    instance_id: Option<String>,
    test_case_id: String,
    execution_id: String,
) -> Result<ExecutionIds> {
    let instance_id = instance_id
        .or_else(|| config.backend.instance_id.clone())
        .ok_or_else(|| {
            Error::Config("No instance id given and none configured in [backend]".to_string())
        })?;
    Ok(ExecutionIds {
        instance_id,
        test_case_id,
        execution_id,
    })
}
