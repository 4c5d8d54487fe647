//! Scenario runner
//!
//! Runs scenarios strictly one after another: they share one remote flow and
//! concurrent calls would make results impossible to attribute. Each
//! scenario is validated locally, submitted, awaited and classified.

use serde::Serialize;

use crate::backend::{ExecutionBackend, Target};
use crate::classify::{classify, Verdict};
use crate::driver::{DriverPhase, ExecutionDriver, ExecutionStatus, PollPolicy};
use crate::graph::{validate, ObservationGraph, ValidationReport};

/// One scenario to run
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub target: Target,
    pub graph: ObservationGraph,
}

/// Suite-level gating
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuitePolicy {
    /// Scenarios that must pass for the rest of the suite to run
    pub stop_on_failure_of: Vec<String>,
}

impl SuitePolicy {
    pub fn stop_on_failure_of(mut self, name: &str) -> Self {
        self.stop_on_failure_of.push(name.to_string());
        self
    }

    pub fn gates(&self, name: &str) -> bool {
        self.stop_on_failure_of.iter().any(|n| n == name)
    }
}

/// Settings fixed for the lifetime of a runner
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerConfig {
    pub poll: PollPolicy,
}

/// How one scenario ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// Ran to a verdict
    Completed(Verdict),
    /// Rejected locally, the backend was never contacted
    InvalidGraph(ValidationReport),
    /// Create or start failed
    SubmissionFailed { message: String },
}

/// Per-scenario status shown in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Stopped,
    TimedOut,
    InvalidGraph,
    SubmissionError,
}

impl ScenarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "PASSED",
            ScenarioStatus::Failed => "FAILED",
            ScenarioStatus::Stopped => "STOPPED",
            ScenarioStatus::TimedOut => "TIMED_OUT",
            ScenarioStatus::InvalidGraph => "INVALID_GRAPH",
            ScenarioStatus::SubmissionError => "SUBMISSION_ERROR",
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: ScenarioStatus,
    pub phase: DriverPhase,
    pub outcome: ScenarioOutcome,
}

impl ScenarioResult {
    fn new(name: &str, outcome: ScenarioOutcome) -> Self {
        let (status, phase) = match &outcome {
            ScenarioOutcome::Completed(verdict) => {
                let status = match verdict.overall_status {
                    ExecutionStatus::Passed => ScenarioStatus::Passed,
                    ExecutionStatus::Failed => ScenarioStatus::Failed,
                    ExecutionStatus::Stopped => ScenarioStatus::Stopped,
                    ExecutionStatus::TimedOut
                    | ExecutionStatus::Pending
                    | ExecutionStatus::Running => ScenarioStatus::TimedOut,
                };
                (status, DriverPhase::Terminal)
            }
            ScenarioOutcome::InvalidGraph(_) => {
                (ScenarioStatus::InvalidGraph, DriverPhase::NotSubmitted)
            }
            ScenarioOutcome::SubmissionFailed { .. } => {
                (ScenarioStatus::SubmissionError, DriverPhase::NotSubmitted)
            }
        };
        Self {
            name: name.to_string(),
            status,
            phase,
            outcome,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            ScenarioOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }
}

/// Aggregated result of a suite run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub results: Vec<ScenarioResult>,
    /// Scenarios never run because a gating scenario failed
    pub skipped: Vec<String>,
    /// Gating scenario that stopped the suite
    pub aborted_by: Option<String>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// True when every scenario ran and passed
    pub fn all_passed(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(ScenarioResult::passed)
    }
}

/// Hooks for live progress output
pub trait SuiteObserver {
    fn scenario_started(&mut self, _scenario: &Scenario) {}
    fn scenario_finished(&mut self, _result: &ScenarioResult) {}
}

impl SuiteObserver for () {}

/// Runs scenarios against one backend
pub struct SuiteRunner<'a> {
    backend: &'a dyn ExecutionBackend,
    config: RunnerConfig,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend, config: RunnerConfig) -> Self {
        Self { backend, config }
    }

    /// Run scenarios in order, honoring the gating policy
    pub async fn run_suite(&self, scenarios: &[Scenario], policy: &SuitePolicy) -> SuiteReport {
        self.run_suite_with(scenarios, policy, &mut ()).await
    }

    /// Like [`run_suite`](Self::run_suite) with progress callbacks
    pub async fn run_suite_with(
        &self,
        scenarios: &[Scenario],
        policy: &SuitePolicy,
        observer: &mut dyn SuiteObserver,
    ) -> SuiteReport {
        let mut report = SuiteReport::default();

        for (i, scenario) in scenarios.iter().enumerate() {
            observer.scenario_started(scenario);
            let result = self.run_scenario(scenario).await;
            observer.scenario_finished(&result);

            let stop = policy.gates(&scenario.name) && !result.passed();
            report.results.push(result);

            if stop {
                report.aborted_by = Some(scenario.name.clone());
                report.skipped = scenarios[i + 1..].iter().map(|s| s.name.clone()).collect();
                tracing::warn!(
                    scenario = %scenario.name,
                    skipped = report.skipped.len(),
                    "Gating scenario did not pass, stopping suite"
                );
                break;
            }
        }

        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            "Suite finished"
        );
        report
    }

    /// Validate, submit, await and classify one scenario
    #[tracing::instrument(skip_all, fields(scenario = %scenario.name))]
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let validation = validate(&scenario.graph);
        for issue in validation.warnings() {
            tracing::warn!(observation = ?issue.observation, "{}", issue.message);
        }
        if !validation.is_submit_ready() {
            tracing::error!(
                issues = validation.fatal().count(),
                "Graph is not submit-ready, skipping submission"
            );
            return ScenarioResult::new(&scenario.name, ScenarioOutcome::InvalidGraph(validation));
        }

        let driver = ExecutionDriver::new(self.backend);
        let handle = match driver
            .submit(
                &scenario.graph,
                &scenario.target,
                &scenario.name,
                &scenario.description,
            )
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Submission failed");
                return ScenarioResult::new(
                    &scenario.name,
                    ScenarioOutcome::SubmissionFailed {
                        message: e.to_string(),
                    },
                );
            }
        };

        let handle = driver.await_completion(handle, &self.config.poll).await;
        let verdict = classify(self.backend, &handle).await;
        ScenarioResult::new(&scenario.name, ScenarioOutcome::Completed(verdict))
    }
}
