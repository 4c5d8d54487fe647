//! Execution backend wire types
//!
//! Request and response bodies for the test-case API. Keys are PascalCase
//! on the wire; statuses are upper snake case.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies which remote flow a test case exercises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Contact-center instance hosting the flow
    pub instance_id: String,
    /// Flow the test call enters
    pub flow_id: String,
}

/// Entry point of a test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntryPoint {
    #[serde(rename = "Type")]
    pub kind: String,
    pub voice_call_entry_point_parameters: VoiceCallParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceCallParameters {
    pub flow_id: String,
}

impl EntryPoint {
    pub fn voice_call(flow_id: &str) -> Self {
        Self {
            kind: "VOICE_CALL".to_string(),
            voice_call_entry_point_parameters: VoiceCallParameters {
                flow_id: flow_id.to_string(),
            },
        }
    }
}

/// Body of a create-test-case request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTestCaseRequest {
    pub name: String,
    pub description: String,
    /// Serialized observation graph
    pub content: String,
    pub status: String,
    pub entry_point: EntryPoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTestCaseResponse {
    pub test_case_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartExecutionRequest {
    /// Idempotency token for the start call
    pub client_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartExecutionResponse {
    pub test_case_execution_id: String,
}

/// Execution status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendStatus {
    #[serde(alias = "INITIATED")]
    Pending,
    Passed,
    Failed,
    Stopped,
    // Unknown statuses keep the poll going
    #[serde(alias = "IN_PROGRESS", other)]
    Running,
}

impl BackendStatus {
    /// Only passed, failed and stopped end an execution
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BackendStatus::Passed | BackendStatus::Failed | BackendStatus::Stopped
        )
    }
}

/// Observation counters in an execution summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObservationSummary {
    #[serde(default)]
    pub total_observations: u32,
    #[serde(default)]
    pub observations_passed: u32,
    #[serde(default)]
    pub observations_failed: u32,
}

/// Response of a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionSummary {
    pub status: BackendStatus,
    #[serde(default)]
    pub observation_summary: ObservationSummary,
    /// Run duration in seconds, once known
    #[serde(default, rename = "Duration")]
    pub duration_seconds: Option<f64>,
}

/// One opaque execution record; `record` holds a JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawRecord {
    #[serde(default)]
    pub record: Option<String>,
}

impl RawRecord {
    pub fn new(record: impl Into<String>) -> Self {
        Self {
            record: Some(record.into()),
        }
    }
}

/// One page of a record listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordPage {
    #[serde(default, alias = "ExecutionRecords")]
    pub test_case_execution_records: Vec<RawRecord>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default, alias = "__type", alias = "Code")]
    pub code: Option<String>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

/// Per-observation status inside an execution record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationStatus {
    Passed,
    Failed,
    #[serde(other)]
    Pending,
}

/// Decoded observation-level record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObservationRecord {
    pub identifier: String,
    pub status: ObservationStatus,
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub actual_event: Option<Value>,
}
