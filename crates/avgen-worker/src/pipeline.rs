//! Job orchestration.
//!
//! One job runs `Received -> Staging -> Executing -> Locating -> Publishing ->
//! Completed`, dropping into `Failed` from any stage. The workspace is
//! released after the terminal state on every path, including panics.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;

use futures::FutureExt;
use tracing::Instrument;

use avgen_media::{
    ArtifactLocator, Fetcher, MediaResult, ProcessOutput, ProcessRunner, Workspace,
};
use avgen_models::{JobId, JobOutput, JobRequest, JobState, JobSuccess};
use avgen_storage::{PublishOutcome, Publisher};

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;

pub const SUCCESS_MESSAGE: &str = "Processing completed successfully.";

/// Where a job got to, and what the generator printed if it ran.
#[derive(Debug, Default)]
struct Progress {
    state: JobState,
    process: Option<ProcessOutput>,
}

impl Progress {
    fn enter(&mut self, logger: &JobLogger, workspace: &Workspace, state: JobState) {
        self.state = state;
        logger.stage(state, workspace.root());
    }
}

/// Runs generation jobs against one configuration and one publisher.
///
/// Holds no per-job state; concurrent `run` calls are isolated by their
/// workspaces and upload keys.
#[derive(Debug)]
pub struct JobPipeline {
    config: WorkerConfig,
    fetcher: Fetcher,
    runner: ProcessRunner,
    locator: ArtifactLocator,
    publisher: Publisher,
}

impl JobPipeline {
    pub fn new(config: WorkerConfig, publisher: Publisher) -> PipelineResult<Self> {
        let fetcher = Fetcher::new(config.fetch_timeout)?;
        let runner = config.runner();
        let locator = config.artifact_locator();

        Ok(Self {
            config,
            fetcher,
            runner,
            locator,
            publisher,
        })
    }

    /// Run one job to a structured result. Never panics and never errors;
    /// failure is reported in the returned output.
    pub async fn run(&self, request: JobRequest) -> JobOutput {
        let logger = JobLogger::new(JobId::new());
        let started = Instant::now();

        let span = logger.span();
        let result = AssertUnwindSafe(self.execute(&logger, request))
            .catch_unwind()
            .instrument(span)
            .await;

        let output = match result {
            Ok(output) => output,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                logger.panicked(&message);
                PipelineError::internal(message).into_output(None)
            }
        };

        let elapsed = started.elapsed();
        logger.finished(&output, elapsed);
        metrics::record_job(&output, elapsed.as_secs_f64());
        output
    }

    async fn execute(&self, logger: &JobLogger, request: JobRequest) -> JobOutput {
        let request = match request.accept() {
            Ok(request) => request,
            Err(e) => {
                logger.rejected(&e);
                return PipelineError::from(e).into_output(None);
            }
        };
        logger.accepted(&request);

        let workspace = match Workspace::allocate(&self.config.scratch_root).await {
            Ok(workspace) => workspace,
            Err(e) => {
                let err = PipelineError::from(e);
                logger.failed(JobState::Received, &err);
                return err.into_output(None);
            }
        };

        let mut progress = Progress::default();
        let result = self
            .run_stages(logger, &workspace, &request, &mut progress)
            .await;

        let output = match result {
            Ok(output) => {
                logger.stage(JobState::Completed, workspace.root());
                output
            }
            Err(err) => {
                logger.failed(progress.state, &err);
                err.into_output(progress.process.as_ref())
            }
        };

        let root = workspace.root().to_path_buf();
        let cleanup = workspace.release().await;
        settle(logger, output, &root, cleanup)
    }

    async fn run_stages(
        &self,
        logger: &JobLogger,
        workspace: &Workspace,
        request: &JobRequest,
        progress: &mut Progress,
    ) -> PipelineResult<JobOutput> {
        progress.enter(logger, workspace, JobState::Staging);
        let (audio, video) = tokio::try_join!(
            self.fetcher.fetch(&request.audio_path, workspace.audio_dir()),
            self.fetcher.fetch(&request.video_path, workspace.video_dir()),
        )?;

        progress.enter(logger, workspace, JobState::Executing);
        let generator_started = Instant::now();
        let run = self.runner.run(&audio.local_path, &video.local_path).await;
        metrics::record_generator_duration(generator_started.elapsed().as_secs_f64());
        let process = run?;
        let (stdout, stderr) = (process.stdout.clone(), process.stderr.clone());
        progress.process = Some(process);

        progress.enter(logger, workspace, JobState::Locating);
        let artifact = self.locator.locate(workspace, request.fps).await?;
        logger.artifact(&artifact);

        match &self.publisher {
            Publisher::Configured { .. } => progress.enter(logger, workspace, JobState::Publishing),
            Publisher::Unconfigured { reason } => logger.publish_skipped(reason),
        }

        let output = match self.publisher.publish(&artifact).await? {
            PublishOutcome::Published { url, .. } => JobSuccess {
                stdout,
                stderr,
                video_url: Some(url),
                message: SUCCESS_MESSAGE.to_string(),
            },
            PublishOutcome::Skipped { reason } => JobSuccess {
                stdout,
                stderr,
                video_url: None,
                message: format!(
                    "Processing completed successfully, but the result was not uploaded ({}).",
                    reason
                ),
            },
        };

        Ok(JobOutput::Success(output))
    }
}

/// Fold the workspace release into the job result. A failed release is
/// logged; the result is returned unchanged either way.
fn settle(
    logger: &JobLogger,
    output: JobOutput,
    workspace: &Path,
    cleanup: MediaResult<()>,
) -> JobOutput {
    if let Err(e) = cleanup {
        logger.cleanup_failed(workspace, &e);
    }
    output
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_failed_cleanup_keeps_result() {
        let logger = JobLogger::new(JobId::new());
        let failed_release = || -> MediaResult<()> {
            Err(avgen_media::MediaError::Workspace {
                path: "/tmp/avgen/ws".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        };

        let success = JobOutput::Success(JobSuccess {
            stdout: "ok".into(),
            stderr: String::new(),
            video_url: Some("https://cdn.example.com/serverless/a.mp4".into()),
            message: SUCCESS_MESSAGE.into(),
        });
        let settled = settle(&logger, success.clone(), Path::new("/tmp/avgen/ws"), failed_release());
        assert_eq!(settled, success);

        let failure = PipelineError::Publish("AccessDenied".into()).into_output(None);
        let settled = settle(&logger, failure.clone(), Path::new("/tmp/avgen/ws"), failed_release());
        assert_eq!(settled, failure);
        assert_eq!(settled.error_kind(), Some(avgen_models::ErrorKind::PublishError));
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let scratch = tempfile::TempDir::new().unwrap();
        let root = scratch.path().join("scratch");
        let config = WorkerConfig {
            scratch_root: root.clone(),
            ..WorkerConfig::default()
        };
        let pipeline = JobPipeline::new(config, Publisher::unconfigured("test")).unwrap();

        let output = pipeline.run(JobRequest::new("  ", "https://x/b.mp4")).await;

        assert_eq!(output.error_kind(), Some(avgen_models::ErrorKind::InvalidRequest));
        assert!(!root.exists());
    }
}
