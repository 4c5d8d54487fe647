//! Result classification
//!
//! Turns the raw record stream of a finished execution into a verdict with
//! per-observation detail. Record order is kept as the backend reports it,
//! which is the order observations were reached during the run.

use serde::Serialize;
use serde_json::Value;

use crate::backend::{
    ExecutionBackend, ObservationRecord, ObservationStatus, ObservationSummary, RawRecord,
};
use crate::common::{Error, Result};
use crate::driver::{ExecutionHandle, ExecutionStatus};

/// Record type tag of observation-level records
const OBSERVATION_RECORD: &str = "OBSERVATION";

/// Outcome of one observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationOutcome {
    pub identifier: String,
    pub status: ObservationStatus,
    /// Event as described in the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_event: Option<Value>,
    /// What the backend actually observed, when it says so
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_event: Option<Value>,
}

impl From<ObservationRecord> for ObservationOutcome {
    fn from(record: ObservationRecord) -> Self {
        Self {
            identifier: record.identifier,
            status: record.status,
            expected_event: record.event,
            actual_event: record.actual_event,
        }
    }
}

/// Classified outcome of one execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub overall_status: ExecutionStatus,
    pub per_observation: Vec<ObservationOutcome>,
    pub test_case_id: String,
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_summary: Option<ObservationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Records that could not be decoded
    pub skipped_records: usize,
    /// The record query itself failed; per-observation detail is missing
    pub records_unavailable: bool,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.overall_status == ExecutionStatus::Passed
    }

    /// Observations that did not pass
    pub fn failed_observations(&self) -> impl Iterator<Item = &ObservationOutcome> {
        self.per_observation
            .iter()
            .filter(|o| o.status != ObservationStatus::Passed)
    }
}

/// Decode one raw record
///
/// Returns `None` for control records and records without a body.
pub fn decode_record(raw: &RawRecord) -> Result<Option<ObservationRecord>> {
    let Some(body) = raw.record.as_deref() else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedRecord(format!("invalid JSON: {e}")))?;
    if value.get("Type").and_then(Value::as_str) != Some(OBSERVATION_RECORD) {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::MalformedRecord(e.to_string()))
}

/// Build a verdict from an already-fetched record stream
pub fn classify_records(handle: &ExecutionHandle, records: &[RawRecord]) -> Verdict {
    let mut verdict = empty_verdict(handle);
    for (index, raw) in records.iter().enumerate() {
        match decode_record(raw) {
            Ok(Some(record)) => verdict.per_observation.push(record.into()),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping execution record");
                verdict.skipped_records += 1;
            }
        }
    }
    verdict
}

/// Fetch the records of a finished execution and classify them
///
/// A failed record query keeps the overall status and marks the detail as
/// unavailable.
pub async fn classify(backend: &dyn ExecutionBackend, handle: &ExecutionHandle) -> Verdict {
    match backend.execution_records(&handle.ids).await {
        Ok(records) => {
            let verdict = classify_records(handle, &records);
            tracing::debug!(
                records = records.len(),
                observations = verdict.per_observation.len(),
                skipped = verdict.skipped_records,
                "Execution records classified"
            );
            verdict
        }
        Err(e) => {
            tracing::warn!(
                execution_id = %handle.ids.execution_id,
                error = %e,
                "Record query failed, verdict has no observation detail"
            );
            Verdict {
                records_unavailable: true,
                ..empty_verdict(handle)
            }
        }
    }
}

fn empty_verdict(handle: &ExecutionHandle) -> Verdict {
    let summary = handle.last_summary.as_ref();
    Verdict {
        overall_status: handle.status,
        per_observation: Vec::new(),
        test_case_id: handle.ids.test_case_id.clone(),
        execution_id: handle.ids.execution_id.clone(),
        observation_summary: summary.map(|s| s.observation_summary),
        duration_seconds: summary.and_then(|s| s.duration_seconds),
        skipped_records: 0,
        records_unavailable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::ScriptedBackend;
    use crate::backend::ExecutionIds;
    use crate::driver::DriverPhase;

    fn handle(status: ExecutionStatus) -> ExecutionHandle {
        ExecutionHandle {
            ids: ExecutionIds {
                instance_id: "inst".to_string(),
                test_case_id: "tc-1".to_string(),
                execution_id: "exec-1".to_string(),
            },
            status,
            phase: DriverPhase::Terminal,
            status_queries: 3,
            last_summary: None,
        }
    }

    fn obs(id: &str, status: &str) -> RawRecord {
        RawRecord::new(format!(
            r#"{{"Type":"OBSERVATION","Identifier":"{id}","Status":"{status}","Event":{{"Type":"MessageReceived","Properties":{{"Text":"x"}}}}}}"#
        ))
    }

    #[test]
    fn test_control_records_are_dropped() {
        let records = vec![
            RawRecord::new(r#"{"Type":"TEST_STARTED","Timestamp":"t0"}"#),
            obs("greet", "PASSED"),
            RawRecord::default(),
            RawRecord::new(r#"{"Type":"ACTION","Identifier":"press-1"}"#),
            obs("done", "PASSED"),
        ];
        let verdict = classify_records(&handle(ExecutionStatus::Passed), &records);
        let ids: Vec<&str> = verdict
            .per_observation
            .iter()
            .map(|o| o.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["greet", "done"]);
        assert_eq!(verdict.skipped_records, 0);
        assert!(verdict.passed());
    }

    #[test]
    fn test_malformed_record_does_not_abort() {
        let records = vec![
            obs("greet", "PASSED"),
            RawRecord::new("{not json"),
            RawRecord::new(r#"{"Type":"OBSERVATION","Status":"PASSED"}"#),
            obs("done", "FAILED"),
        ];
        let verdict = classify_records(&handle(ExecutionStatus::Failed), &records);
        assert_eq!(verdict.per_observation.len(), 2);
        assert_eq!(verdict.skipped_records, 2);
        let failed: Vec<&str> = verdict
            .failed_observations()
            .map(|o| o.identifier.as_str())
            .collect();
        assert_eq!(failed, vec!["done"]);
    }

    #[test]
    fn test_backend_order_is_preserved() {
        let records = vec![obs("b", "PASSED"), obs("a", "PENDING"), obs("c", "FAILED")];
        let verdict = classify_records(&handle(ExecutionStatus::Failed), &records);
        let got: Vec<(&str, ObservationStatus)> = verdict
            .per_observation
            .iter()
            .map(|o| (o.identifier.as_str(), o.status))
            .collect();
        assert_eq!(
            got,
            vec![
                ("b", ObservationStatus::Passed),
                ("a", ObservationStatus::Pending),
                ("c", ObservationStatus::Failed),
            ]
        );
    }

    #[test]
    fn test_actual_event_is_kept() {
        let raw = RawRecord::new(
            r#"{"Type":"OBSERVATION","Identifier":"done","Status":"FAILED",
                "Event":{"Properties":{"Text":"selected sales"}},
                "ActualEvent":{"Properties":{"Text":"selected support"}}}"#,
        );
        let record = decode_record(&raw).unwrap().unwrap();
        assert_eq!(
            record.actual_event.unwrap()["Properties"]["Text"],
            "selected support"
        );
    }

    #[tokio::test]
    async fn test_record_query_failure_keeps_status() {
        let backend = ScriptedBackend::default();
        *backend.records.lock().unwrap() =
            Some(Err(Error::backend(500, "InternalServiceException", "boom")));
        let verdict = classify(&backend, &handle(ExecutionStatus::TimedOut)).await;
        assert_eq!(verdict.overall_status, ExecutionStatus::TimedOut);
        assert!(verdict.records_unavailable);
        assert!(verdict.per_observation.is_empty());
    }
}
