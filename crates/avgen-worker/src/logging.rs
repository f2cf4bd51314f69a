//! Job lifecycle events.
//!
//! Each event names the job and, where one exists, the workspace, so a
//! single job can be followed through interleaved concurrent output.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn, Span};

use avgen_models::{JobId, JobOutput, JobRequest, JobState};

use crate::error::PipelineError;

/// Emits the lifecycle events of one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }

    /// Span wrapping the whole job.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }

    pub fn accepted(&self, request: &JobRequest) {
        info!(
            job_id = %self.job_id,
            audio = %request.audio_path,
            video = %request.video_path,
            fps = ?request.fps,
            "Job accepted"
        );
    }

    /// Rejected before a workspace existed.
    pub fn rejected(&self, reason: &dyn Display) {
        warn!(job_id = %self.job_id, reason = %reason, "Job rejected");
    }

    pub fn stage(&self, state: JobState, workspace: &Path) {
        info!(
            job_id = %self.job_id,
            state = state.as_str(),
            workspace = %workspace.display(),
            "Job entered {}", state
        );
    }

    pub fn artifact(&self, path: &Path) {
        info!(job_id = %self.job_id, path = %path.display(), "Artifact ready");
    }

    pub fn publish_skipped(&self, reason: &str) {
        warn!(job_id = %self.job_id, reason, "Publishing skipped");
    }

    pub fn failed(&self, state: JobState, err: &PipelineError) {
        error!(
            job_id = %self.job_id,
            state = state.as_str(),
            kind = err.kind().as_str(),
            "Job failed: {}", err
        );
    }

    pub fn panicked(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            kind = "internal_error",
            "Job panicked: {}", message
        );
    }

    /// Workspace removal failed. The job result stands.
    pub fn cleanup_failed(&self, workspace: &Path, err: &dyn Display) {
        warn!(
            job_id = %self.job_id,
            workspace = %workspace.display(),
            error = %err,
            "Workspace cleanup failed"
        );
    }

    pub fn finished(&self, output: &JobOutput, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            outcome = output.outcome(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Job finished"
        );
    }
}
