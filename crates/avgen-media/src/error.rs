//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while staging, generating or locating media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to retrieve {uri}: {message}")]
    RetrievalFailed { uri: String, message: String },

    #[error("Unsupported source URI: {0}")]
    UnsupportedSource(String),

    #[error("Executable '{program}' not found: {message}")]
    ExecutableNotFound { program: String, message: String },

    #[error("Failed to start '{program}': {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Generator exited with status {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ProcessFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("No output artifact found: {0}")]
    ArtifactNotFound(String),

    #[error("Frame encoding failed: {0}")]
    Encoding(String),

    #[error("Workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a retrieval failure error.
    pub fn retrieval_failed(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::RetrievalFailed {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Create an artifact-not-found error.
    pub fn artifact_not_found(message: impl Into<String>) -> Self {
        Self::ArtifactNotFound(message.into())
    }

    /// Create an encoding failure error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }
}
