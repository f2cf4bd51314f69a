//! External generator invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// How to start the generator: `<program> <args..> --audio_path <a> --video_path <v>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCommand {
    /// Executable name (looked up in PATH) or path
    pub program: String,
    /// Arguments placed before the input paths
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
}

impl GeneratorCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument list for the given inputs.
    pub fn build_args(&self, audio: &Path, video: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--audio_path".to_string());
        args.push(audio.to_string_lossy().to_string());
        args.push("--video_path".to_string());
        args.push(video.to_string_lossy().to_string());
        args
    }

    /// Resolve the executable, relative to the working directory when set.
    pub fn resolve(&self) -> MediaResult<PathBuf> {
        let cwd = match &self.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        which::which_in(&self.program, std::env::var_os("PATH"), cwd).map_err(|e| {
            MediaError::ExecutableNotFound {
                program: self.program.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// Captured result of a generator run that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs the generator synchronously, capturing its output.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: GeneratorCommand,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(command: GeneratorCommand) -> Self {
        Self {
            command,
            timeout: None,
        }
    }

    /// Kill the generator if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command(&self) -> &GeneratorCommand {
        &self.command
    }

    /// Run the generator on the staged inputs and wait for it to exit.
    ///
    /// A non-zero exit yields [`MediaError::ProcessFailed`] carrying the
    /// captured streams; a missing executable yields
    /// [`MediaError::ExecutableNotFound`].
    pub async fn run(&self, audio: &Path, video: &Path) -> MediaResult<ProcessOutput> {
        let program = self.command.resolve()?;
        let args = self.command.build_args(audio, video);
        debug!("Running generator: {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.command.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| MediaError::SpawnFailed {
            program: self.command.program.clone(),
            message: e.to_string(),
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!("Generator timed out after {:?}, killing process", limit);
                    return Err(MediaError::Timeout(limit));
                }
            },
            None => child.wait_with_output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "Generator failed");
            return Err(MediaError::ProcessFailed {
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        info!(
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Generator finished"
        );
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout,
            stderr,
        })
    }
}
