//! Execution backend boundary
//!
//! The backend creates test cases from serialized graphs, runs them against
//! a live flow and decides pass or fail for each observation. The harness
//! only talks to it through [`ExecutionBackend`].

pub mod http;
pub mod protocol;

use async_trait::async_trait;

use crate::common::Result;

pub use http::HttpBackend;
pub use protocol::{
    BackendStatus, CreateTestCaseRequest, ExecutionSummary, ObservationRecord, ObservationStatus,
    ObservationSummary, RawRecord, Target,
};

/// Ids of one submitted execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionIds {
    pub instance_id: String,
    pub test_case_id: String,
    pub execution_id: String,
}

/// Operations the harness needs from the execution service
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Create a test case; returns its id
    async fn create_test_case(
        &self,
        instance_id: &str,
        request: &CreateTestCaseRequest,
    ) -> Result<String>;

    /// Start an execution of a test case; returns the execution id
    async fn start_execution(
        &self,
        instance_id: &str,
        test_case_id: &str,
        client_token: &str,
    ) -> Result<String>;

    /// Query the current status of an execution
    async fn execution_summary(&self, ids: &ExecutionIds) -> Result<ExecutionSummary>;

    /// List every record of an execution
    async fn execution_records(&self, ids: &ExecutionIds) -> Result<Vec<RawRecord>>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory backend for unit tests

    use super::*;
    use crate::common::Error;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    pub struct ScriptedBackend {
        pub fail_create: bool,
        pub fail_start: bool,
        pub statuses: Mutex<VecDeque<Result<ExecutionSummary>>>,
        pub records: Mutex<Option<Result<Vec<RawRecord>>>>,
        pub status_calls: Mutex<u32>,
        pub created: Mutex<Vec<CreateTestCaseRequest>>,
        /// Time every status query takes to answer
        pub query_delay: Option<Duration>,
    }

    impl ScriptedBackend {
        pub fn with_statuses(statuses: Vec<Result<ExecutionSummary>>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                ..Self::default()
            }
        }

        pub fn with_records(self, records: Vec<RawRecord>) -> Self {
            *self.records.lock().unwrap() = Some(Ok(records));
            self
        }

        pub fn status_calls(&self) -> u32 {
            *self.status_calls.lock().unwrap()
        }
    }

    pub fn summary(status: BackendStatus) -> Result<ExecutionSummary> {
        Ok(ExecutionSummary {
            status,
            observation_summary: ObservationSummary::default(),
            duration_seconds: None,
        })
    }

    #[async_trait]
    impl ExecutionBackend for ScriptedBackend {
        async fn create_test_case(
            &self,
            _instance_id: &str,
            request: &CreateTestCaseRequest,
        ) -> Result<String> {
            if self.fail_create {
                return Err(Error::backend(400, "InvalidRequestException", "bad content"));
            }
            self.created.lock().unwrap().push(request.clone());
            Ok("tc-1".to_string())
        }

        async fn start_execution(
            &self,
            _instance_id: &str,
            _test_case_id: &str,
            _client_token: &str,
        ) -> Result<String> {
            if self.fail_start {
                return Err(Error::backend(409, "ConflictException", "already running"));
            }
            Ok("exec-1".to_string())
        }

        async fn execution_summary(&self, _ids: &ExecutionIds) -> Result<ExecutionSummary> {
            *self.status_calls.lock().unwrap() += 1;
            if let Some(delay) = self.query_delay {
                tokio::time::sleep(delay).await;
            }
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| summary(BackendStatus::Running))
        }

        async fn execution_records(&self, _ids: &ExecutionIds) -> Result<Vec<RawRecord>> {
            self.records
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
