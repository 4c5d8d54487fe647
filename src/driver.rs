//! Execution driver
//!
//! Submits a graph to the backend and polls the execution until it reaches
//! a terminal status or the attempt budget runs out. The only suspension
//! point is the sleep between status queries.

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use crate::backend::protocol::{CreateTestCaseRequest, EntryPoint};
use crate::backend::{BackendStatus, ExecutionBackend, ExecutionIds, ExecutionSummary, Target};
use crate::common::{Error, Result, SubmitStage};
use crate::graph::ObservationGraph;

/// How long and how often to wait for an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep before every status query
    pub interval: Duration,
    /// Status queries issued before the driver gives up
    pub max_attempts: u32,
    /// Cap on a single status query
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 24,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// When the last status query is issued, measured from the start of the wait
    pub fn deadline(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Upper bound on the whole wait: the deadline plus one capped final query
    pub fn max_wait(&self) -> Duration {
        if self.max_attempts == 0 {
            return Duration::ZERO;
        }
        self.deadline() + self.interval.min(self.request_timeout)
    }
}

/// Driver state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverPhase {
    NotSubmitted,
    Submitted,
    Polling,
    Terminal,
}

/// Status of one execution as seen by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Stopped,
    /// No terminal status before the deadline; never reported by the backend
    TimedOut,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Passed => "PASSED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Stopped => "STOPPED",
            ExecutionStatus::TimedOut => "TIMED_OUT",
        }
    }
}

impl From<BackendStatus> for ExecutionStatus {
    fn from(status: BackendStatus) -> Self {
        match status {
            BackendStatus::Pending => ExecutionStatus::Pending,
            BackendStatus::Running => ExecutionStatus::Running,
            BackendStatus::Passed => ExecutionStatus::Passed,
            BackendStatus::Failed => ExecutionStatus::Failed,
            BackendStatus::Stopped => ExecutionStatus::Stopped,
        }
    }
}

/// One submitted execution
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    pub ids: ExecutionIds,
    pub status: ExecutionStatus,
    pub phase: DriverPhase,
    /// Status queries issued so far
    pub status_queries: u32,
    /// Most recent successful status response
    pub last_summary: Option<ExecutionSummary>,
}

/// Drives executions against a backend
pub struct ExecutionDriver<'a> {
    backend: &'a dyn ExecutionBackend,
}

impl<'a> ExecutionDriver<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend) -> Self {
        Self { backend }
    }

    /// Create a test case from `graph` and start one execution of it
    ///
    /// Either step failing is a `Submission` error; nothing is retried.
    #[tracing::instrument(skip(self, graph, description), fields(flow = %target.flow_id))]
    pub async fn submit(
        &self,
        graph: &ObservationGraph,
        target: &Target,
        name: &str,
        description: &str,
    ) -> Result<ExecutionHandle> {
        let request = CreateTestCaseRequest {
            name: unique_name(name),
            description: description.to_string(),
            content: graph.to_content_json()?,
            status: "PUBLISHED".to_string(),
            entry_point: EntryPoint::voice_call(&target.flow_id),
        };

        let test_case_id = self
            .backend
            .create_test_case(&target.instance_id, &request)
            .await
            .map_err(|e| Error::submission(SubmitStage::Create, e))?;
        tracing::info!(test_case_id = %test_case_id, name = %request.name, "Test case created");

        let execution_id = self
            .backend
            .start_execution(&target.instance_id, &test_case_id, &client_token())
            .await
            .map_err(|e| Error::submission(SubmitStage::Start, e))?;
        tracing::info!(execution_id = %execution_id, "Execution started");

        Ok(ExecutionHandle {
            ids: ExecutionIds {
                instance_id: target.instance_id.clone(),
                test_case_id,
                execution_id,
            },
            status: ExecutionStatus::Pending,
            phase: DriverPhase::Submitted,
            status_queries: 0,
            last_summary: None,
        })
    }

    /// Poll until the execution is terminal or `policy.max_attempts` runs out
    ///
    /// Queries run on a fixed schedule, one per `interval` from the start of
    /// the wait, and each must answer before the next tick. Slow queries
    /// therefore never push the schedule back: the last query starts at
    /// `policy.deadline()` and the whole wait ends by `policy.max_wait()`.
    ///
    /// Returns as soon as a terminal status is seen. A failed or expired
    /// status query is logged and counted against the budget; it never
    /// aborts the wait. When the budget runs out the handle is marked
    /// `TimedOut`.
    pub async fn await_completion(
        &self,
        mut handle: ExecutionHandle,
        policy: &PollPolicy,
    ) -> ExecutionHandle {
        handle.phase = DriverPhase::Polling;
        let start = Instant::now();

        for attempt in 1..=policy.max_attempts {
            let tick = start + policy.interval * attempt;
            tokio::time::sleep_until(tick).await;
            handle.status_queries += 1;

            let budget = (tick + policy.interval)
                .saturating_duration_since(Instant::now())
                .min(policy.request_timeout);
            let query = tokio::time::timeout(budget, self.backend.execution_summary(&handle.ids))
                .await
                .unwrap_or_else(|_| Err(Error::PollTimeout(budget.as_secs())));

            match query {
                Ok(summary) => {
                    let obs = summary.observation_summary;
                    tracing::debug!(
                        attempt,
                        status = ?summary.status,
                        passed = obs.observations_passed,
                        failed = obs.observations_failed,
                        total = obs.total_observations,
                        duration = ?summary.duration_seconds,
                        "Execution status"
                    );
                    handle.status = summary.status.into();
                    handle.last_summary = Some(summary);
                    if handle.status.is_terminal() {
                        handle.phase = DriverPhase::Terminal;
                        tracing::info!(
                            execution_id = %handle.ids.execution_id,
                            status = handle.status.as_str(),
                            attempts = attempt,
                            "Execution finished"
                        );
                        return handle;
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "Status query failed, still polling");
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Status query rejected, still polling");
                }
            }
        }

        handle.status = ExecutionStatus::TimedOut;
        handle.phase = DriverPhase::Terminal;
        tracing::warn!(
            execution_id = %handle.ids.execution_id,
            attempts = policy.max_attempts,
            deadline_secs = policy.deadline().as_secs(),
            "No terminal status before deadline"
        );
        handle
    }
}

/// Test-case names must be unique per instance
fn unique_name(name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{name}-{millis}")
}

/// Random idempotency token in UUID layout
fn client_token() -> String {
    let hex = format!("{:032x}", rand::random::<u128>());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
