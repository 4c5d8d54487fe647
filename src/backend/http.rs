//! HTTP client for the test-case API
//!
//! JSON over HTTPS. Credential acquisition is out of scope: an optional
//! bearer token is read from the environment variable named in config.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::protocol::{
    CreateTestCaseRequest, CreateTestCaseResponse, ErrorBody, ExecutionSummary, RawRecord,
    RecordPage, StartExecutionRequest, StartExecutionResponse,
};
use super::{ExecutionBackend, ExecutionIds};
use crate::common::config::BackendConfig;
use crate::common::{Error, Result};

/// Upper bound on record pages fetched for one execution
const MAX_RECORD_PAGES: usize = 100;

/// Backend reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
    credential: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("ivr-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let credential = config.credential();
        if config.credential_env.is_some() && credential.is_none() {
            tracing::warn!(
                var = config.credential_env.as_deref().unwrap_or_default(),
                "Credential environment variable is unset or empty"
            );
        }
        Ok(Self {
            client,
            base_url: config.base_url(),
            credential,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "Backend request");
        let builder = self.client.request(method, url);
        match &self.credential {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        decode(response).await
    }

    fn execution_path(ids: &ExecutionIds) -> String {
        format!(
            "/test-cases/{}/{}/executions/{}",
            ids.instance_id, ids.test_case_id, ids.execution_id
        )
    }
}

/// Decode a 2xx body or turn an error body into `Error::Backend`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
    let message = body
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
    // Error types sometimes arrive as "namespace#Name"
    let code = body
        .code
        .map(|c| c.rsplit('#').next().unwrap_or_default().to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("UNKNOWN").to_string());
    Err(Error::backend(status.as_u16(), &code, &message))
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn create_test_case(
        &self,
        instance_id: &str,
        request: &CreateTestCaseRequest,
    ) -> Result<String> {
        let path = format!("/test-cases/{instance_id}");
        let response: CreateTestCaseResponse =
            self.send_json(Method::PUT, &path, Some(request)).await?;
        Ok(response.test_case_id)
    }

    async fn start_execution(
        &self,
        instance_id: &str,
        test_case_id: &str,
        client_token: &str,
    ) -> Result<String> {
        let path = format!("/test-cases/{instance_id}/{test_case_id}/executions");
        let body = StartExecutionRequest {
            client_token: client_token.to_string(),
        };
        let response: StartExecutionResponse =
            self.send_json(Method::PUT, &path, Some(&body)).await?;
        Ok(response.test_case_execution_id)
    }

    async fn execution_summary(&self, ids: &ExecutionIds) -> Result<ExecutionSummary> {
        let path = format!("{}/summary", Self::execution_path(ids));
        self.send_json::<(), _>(Method::GET, &path, None).await
    }

    async fn execution_records(&self, ids: &ExecutionIds) -> Result<Vec<RawRecord>> {
        let path = format!("{}/records", Self::execution_path(ids));
        let mut records = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_RECORD_PAGES {
            let mut builder = self.request(Method::GET, &path);
            if let Some(token) = &next_token {
                builder = builder.query(&[("nextToken", token)]);
            }
            let page: RecordPage = decode(builder.send().await?).await?;
            records.extend(page.test_case_execution_records);
            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => return Ok(records),
            }
        }

        tracing::warn!(
            pages = MAX_RECORD_PAGES,
            "Record listing still paginated after page limit; returning partial records"
        );
        Ok(records)
    }
}
