//! Job definitions for the generation pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reasons a payload is rejected before any side effect.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Malformed job payload: {0}")]
    Malformed(String),

    #[error("Missing audio_path or video_path")]
    MissingSource,

    #[error("Invalid job request: {0}")]
    Invalid(String),
}

/// A generation job: one audio source and one video source.
///
/// Immutable once accepted. Both sources must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobRequest {
    /// Audio source URI
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schemars(with = "Option<String>")]
    #[validate(length(min = 1))]
    pub audio_path: String,

    /// Video source URI
    #[serde(default, deserialize_with = "null_as_empty")]
    #[schemars(with = "Option<String>")]
    #[validate(length(min = 1))]
    pub video_path: String,

    /// Frame rate for frame assembly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub fps: Option<u32>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl JobRequest {
    /// Create a request without a frame rate.
    pub fn new(audio_path: impl Into<String>, video_path: impl Into<String>) -> Self {
        Self {
            audio_path: audio_path.into(),
            video_path: video_path.into(),
            fps: None,
        }
    }

    /// Set the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Trim both sources and check the request invariants.
    pub fn accept(mut self) -> Result<Self, RequestError> {
        self.audio_path = self.audio_path.trim().to_string();
        self.video_path = self.video_path.trim().to_string();

        if self.audio_path.is_empty() || self.video_path.is_empty() {
            return Err(RequestError::MissingSource);
        }

        self.validate()
            .map_err(|e| RequestError::Invalid(e.to_string()))?;

        Ok(self)
    }
}

/// Host runtime payload: `{ "input": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobEnvelope {
    #[serde(default)]
    pub input: Option<JobRequest>,
}

impl JobEnvelope {
    /// Parse and accept a raw payload.
    pub fn parse(payload: serde_json::Value) -> Result<JobRequest, RequestError> {
        let envelope: JobEnvelope = serde_json::from_value(payload)
            .map_err(|e| RequestError::Malformed(e.to_string()))?;

        envelope
            .input
            .ok_or(RequestError::MissingSource)?
            .accept()
    }
}

/// Stage of a job in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Payload accepted, nothing staged yet
    #[default]
    Received,
    /// Fetching sources into the workspace
    Staging,
    /// External generator running
    Executing,
    /// Discovering the output artifact
    Locating,
    /// Uploading to the object store
    Publishing,
    /// Finished, with or without a URL
    Completed,
    /// Absorbing failure state
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Received => "received",
            JobState::Staging => "staging",
            JobState::Executing => "executing",
            JobState::Locating => "locating",
            JobState::Publishing => "publishing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
