//! Structured job outputs returned to the host runtime.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy. Every failure a job can produce maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A source URI is missing or the payload is malformed
    InvalidRequest,
    /// A source could not be fetched
    RetrievalError,
    /// The generator could not be started (missing executable, permissions)
    EnvironmentError,
    /// The generator exited non-zero
    ExecutionError,
    /// No output artifact was found
    ArtifactNotFoundError,
    /// Frame assembly failed
    EncodingError,
    /// Upload to the object store failed
    PublishError,
    /// The generator exceeded its time limit
    Timeout,
    /// Anything unanticipated
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::RetrievalError => "retrieval_error",
            ErrorKind::EnvironmentError => "environment_error",
            ErrorKind::ExecutionError => "execution_error",
            ErrorKind::ArtifactNotFoundError => "artifact_not_found_error",
            ErrorKind::EncodingError => "encoding_error",
            ErrorKind::PublishError => "publish_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful job output.
///
/// `video_url` is absent on degraded success (generation succeeded, publish skipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobSuccess {
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub message: String,
}

/// Failed job output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    /// Human-readable description, including the underlying cause
    pub error: String,
    pub error_kind: ErrorKind,
    /// Generator stdout, when the generator ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Generator stderr, when the generator ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// Result of one job, as seen by the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobOutput {
    Failure(JobFailure),
    Success(JobSuccess),
}

impl JobOutput {
    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        JobOutput::Failure(JobFailure {
            error: error.into(),
            error_kind: kind,
            stdout: None,
            stderr: None,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutput::Success(_))
    }

    /// Completed without a published URL.
    pub fn is_degraded(&self) -> bool {
        matches!(self, JobOutput::Success(s) if s.video_url.is_none())
    }

    pub fn video_url(&self) -> Option<&str> {
        match self {
            JobOutput::Success(s) => s.video_url.as_deref(),
            JobOutput::Failure(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            JobOutput::Success(_) => None,
            JobOutput::Failure(f) => Some(f.error_kind),
        }
    }

    /// Outcome label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            JobOutput::Success(s) if s.video_url.is_some() => "completed",
            JobOutput::Success(_) => "degraded",
            JobOutput::Failure(_) => "failed",
        }
    }
}
