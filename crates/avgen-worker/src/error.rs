//! Pipeline error types.

use std::time::Duration;

use thiserror::Error;

use avgen_media::{MediaError, ProcessOutput};
use avgen_models::{ErrorKind, JobFailure, JobOutput, RequestError};
use avgen_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// A job failure, one variant per output error kind.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Script execution failed (exit status {})", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    Execution {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Generator timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::Retrieval(_) => ErrorKind::RetrievalError,
            PipelineError::Environment(_) => ErrorKind::EnvironmentError,
            PipelineError::Execution { .. } => ErrorKind::ExecutionError,
            PipelineError::ArtifactNotFound(_) => ErrorKind::ArtifactNotFoundError,
            PipelineError::Encoding(_) => ErrorKind::EncodingError,
            PipelineError::Publish(_) => ErrorKind::PublishError,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Convert into the structured output.
    ///
    /// `process` is the captured generator output when the generator ran to
    /// completion before the failure. Execution failures carry their own.
    pub fn into_output(self, process: Option<&ProcessOutput>) -> JobOutput {
        let error = self.to_string();
        let error_kind = self.kind();
        let (stdout, stderr) = match self {
            PipelineError::Execution { stdout, stderr, .. } => (Some(stdout), Some(stderr)),
            _ => match process {
                Some(p) => (Some(p.stdout.clone()), Some(p.stderr.clone())),
                None => (None, None),
            },
        };

        JobOutput::Failure(JobFailure {
            error,
            error_kind,
            stdout,
            stderr,
        })
    }
}

impl From<MediaError> for PipelineError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::RetrievalFailed { .. } | MediaError::UnsupportedSource(_) => {
                PipelineError::Retrieval(e.to_string())
            }
            MediaError::ExecutableNotFound { .. }
            | MediaError::SpawnFailed { .. }
            | MediaError::FfmpegNotFound
            | MediaError::Workspace { .. } => PipelineError::Environment(e.to_string()),
            MediaError::ProcessFailed {
                exit_code,
                stdout,
                stderr,
            } => PipelineError::Execution {
                exit_code,
                stdout,
                stderr,
            },
            MediaError::Timeout(limit) => PipelineError::Timeout(limit),
            MediaError::ArtifactNotFound(message) => PipelineError::ArtifactNotFound(message),
            MediaError::Encoding(message) => PipelineError::Encoding(message),
            MediaError::Io(_) => PipelineError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(e: StorageError) -> Self {
        PipelineError::Publish(e.to_string())
    }
}

impl From<RequestError> for PipelineError {
    fn from(e: RequestError) -> Self {
        PipelineError::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_map_to_kinds() {
        let cases = vec![
            (MediaError::retrieval_failed("https://x/a.wav", "404"), ErrorKind::RetrievalError),
            (MediaError::UnsupportedSource("ftp://x".into()), ErrorKind::RetrievalError),
            (
                MediaError::ExecutableNotFound {
                    program: "python".into(),
                    message: "not in PATH".into(),
                },
                ErrorKind::EnvironmentError,
            ),
            (MediaError::FfmpegNotFound, ErrorKind::EnvironmentError),
            (MediaError::Timeout(Duration::from_secs(5)), ErrorKind::Timeout),
            (MediaError::artifact_not_found("empty"), ErrorKind::ArtifactNotFoundError),
            (MediaError::encoding("odd frame"), ErrorKind::EncodingError),
            (
                MediaError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
                ErrorKind::InternalError,
            ),
        ];

        for (media, kind) in cases {
            assert_eq!(PipelineError::from(media).kind(), kind);
        }
    }

    #[test]
    fn test_execution_failure_keeps_streams() {
        let err = PipelineError::from(MediaError::ProcessFailed {
            exit_code: Some(3),
            stdout: "step 1\n".into(),
            stderr: "Traceback\n".into(),
        });

        match err.into_output(None) {
            JobOutput::Failure(f) => {
                assert_eq!(f.error_kind, ErrorKind::ExecutionError);
                assert!(f.error.contains("exit status 3"));
                assert_eq!(f.stdout.as_deref(), Some("step 1\n"));
                assert_eq!(f.stderr.as_deref(), Some("Traceback\n"));
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_later_failures_carry_captured_output() {
        let process = ProcessOutput {
            exit_code: Some(0),
            stdout: "done".into(),
            stderr: String::new(),
        };

        match PipelineError::ArtifactNotFound("no .mp4".into()).into_output(Some(&process)) {
            JobOutput::Failure(f) => {
                assert_eq!(f.error_kind, ErrorKind::ArtifactNotFoundError);
                assert_eq!(f.stdout.as_deref(), Some("done"));
            }
            other => panic!("unexpected output: {:?}", other),
        }

        match PipelineError::Retrieval("404".into()).into_output(None) {
            JobOutput::Failure(f) => {
                assert!(f.stdout.is_none());
                assert!(f.stderr.is_none());
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_storage_and_request_errors() {
        let err = PipelineError::from(StorageError::upload_failed("AccessDenied"));
        assert_eq!(err.kind(), ErrorKind::PublishError);
        assert!(err.to_string().contains("AccessDenied"));

        let err = PipelineError::from(RequestError::MissingSource);
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
