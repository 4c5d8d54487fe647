//! Error types for the IVR harness
//!
//! Structural and submission errors stop a scenario. Transient poll errors
//! and malformed records are absorbed by the driver and classifier and only
//! show up in logs.

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of the create-and-start sequence failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    /// Creating the test case from the serialized graph
    Create,
    /// Starting an execution of the created test case
    Start,
}

impl fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitStage::Create => f.write_str("create"),
            SubmitStage::Start => f.write_str("start"),
        }
    }
}

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Graph Errors ===
    #[error("Duplicate observation identifier '{0}'")]
    DuplicateObservationId(String),

    #[error("Graph is not submit-ready: {0}")]
    GraphStructure(String),

    // === Submission Errors ===
    #[error("Submission failed at {stage} step [{code}]: {message}")]
    Submission {
        stage: SubmitStage,
        code: String,
        message: String,
    },

    // === Backend Errors ===
    #[error("Backend returned HTTP {status} [{code}]: {message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status query timed out after {0} seconds")]
    PollTimeout(u64),

    // === Record Errors ===
    #[error("Malformed execution record: {0}")]
    MalformedRecord(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a backend failure as a submission error for the given stage
    pub fn submission(stage: SubmitStage, source: Error) -> Self {
        let (code, message) = match source {
            Error::Backend { code, message, .. } => (code, message),
            Error::Http(e) => ("HTTP_ERROR".to_string(), e.to_string()),
            Error::PollTimeout(secs) => {
                ("TIMEOUT".to_string(), format!("no response after {secs} seconds"))
            }
            other => ("INTERNAL_ERROR".to_string(), other.to_string()),
        };
        Self::Submission {
            stage,
            code,
            message,
        }
    }

    /// Create a backend error from an HTTP status and decoded body fields
    pub fn backend(status: u16, code: &str, message: &str) -> Self {
        Self::Backend {
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// True for errors the driver absorbs and keeps polling through
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::PollTimeout(_) | Error::Json(_) => true,
            Error::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_keeps_backend_code() {
        let err = Error::submission(
            SubmitStage::Create,
            Error::backend(400, "InvalidRequestException", "bad content"),
        );
        match err {
            Error::Submission {
                stage,
                code,
                message,
            } => {
                assert_eq!(stage, SubmitStage::Create);
                assert_eq!(code, "InvalidRequestException");
                assert_eq!(message, "bad content");
            }
            other => panic!("Expected Submission, got {other:?}"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::PollTimeout(30).is_transient());
        assert!(Error::backend(503, "ServiceUnavailable", "busy").is_transient());
        assert!(Error::backend(429, "Throttling", "slow down").is_transient());
        assert!(!Error::backend(404, "ResourceNotFound", "gone").is_transient());
        assert!(!Error::Config("x".into()).is_transient());
    }
}
