//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use avgen_media::{
    ArtifactLocator, ArtifactStrategy, FrameAssembly, GeneratorCommand, ProcessRunner,
    SearchLocations,
};

/// Which artifact strategy a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactMode {
    /// Scan candidate directories for a media file
    #[default]
    Search,
    /// Encode a directory of frame images
    Frames,
}

impl ArtifactMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Some(ArtifactMode::Search),
            "frames" => Some(ArtifactMode::Frames),
            _ => None,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Shared scratch root; each job gets a directory under it
    pub scratch_root: PathBuf,
    /// Generator invocation
    pub generator: GeneratorCommand,
    /// Kill the generator after this long
    pub generator_timeout: Option<Duration>,
    /// Artifact strategy
    pub artifact_mode: ArtifactMode,
    /// Expected artifact extension
    pub artifact_extension: String,
    /// Directories searched after the workspace output directory
    pub search_dirs: Vec<PathBuf>,
    /// Well-known frame directory
    pub frames_dir: PathBuf,
    /// Frame rate when the request has none
    pub default_fps: u32,
    /// Encoder cache directory
    pub frame_cache_dir: PathBuf,
    /// Upload key prefix
    pub upload_prefix: String,
    /// HTTP timeout for source retrieval
    pub fetch_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_root: PathBuf::from("/tmp/avgen"),
            generator: GeneratorCommand::new("python").arg("run.py"),
            generator_timeout: None,
            artifact_mode: ArtifactMode::Search,
            artifact_extension: "mp4".to_string(),
            search_dirs: vec![
                PathBuf::from("results"),
                PathBuf::from("/app/results"),
                PathBuf::from("/app/output"),
            ],
            frames_dir: PathBuf::from("/app/frames"),
            default_fps: 25,
            frame_cache_dir: PathBuf::from("/tmp/avgen-cache"),
            upload_prefix: "serverless".to_string(),
            fetch_timeout: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from any variable source, using defaults for unset or
    /// unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let generator = match get("AVGEN_GENERATOR_PROGRAM") {
            Some(program) => GeneratorCommand::new(program),
            None => GeneratorCommand::new(defaults.generator.program.clone()),
        };
        let mut generator = GeneratorCommand {
            args: get("AVGEN_GENERATOR_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| defaults.generator.args.clone()),
            ..generator
        };
        if let Some(dir) = get("AVGEN_GENERATOR_WORKDIR") {
            generator = generator.working_dir(dir);
        }

        let artifact_mode = match get("AVGEN_ARTIFACT_STRATEGY") {
            Some(value) => ArtifactMode::parse(&value).unwrap_or_else(|| {
                warn!("Unknown AVGEN_ARTIFACT_STRATEGY '{}', using search", value);
                ArtifactMode::Search
            }),
            None => defaults.artifact_mode,
        };

        Self {
            scratch_root: get("AVGEN_SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            generator,
            generator_timeout: get("AVGEN_GENERATOR_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            artifact_mode,
            artifact_extension: get("AVGEN_ARTIFACT_EXTENSION")
                .map(|e| e.trim_start_matches('.').to_string())
                .unwrap_or(defaults.artifact_extension),
            search_dirs: get("AVGEN_SEARCH_DIRS")
                .map(|dirs| {
                    dirs.split(':')
                        .filter(|d| !d.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or(defaults.search_dirs),
            frames_dir: get("AVGEN_FRAMES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frames_dir),
            default_fps: get("AVGEN_DEFAULT_FPS")
                .and_then(|s| s.parse().ok())
                .filter(|fps| *fps > 0)
                .unwrap_or(defaults.default_fps),
            frame_cache_dir: get("AVGEN_FRAME_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frame_cache_dir),
            upload_prefix: get("AVGEN_UPLOAD_PREFIX").unwrap_or(defaults.upload_prefix),
            fetch_timeout: Duration::from_secs(
                get("AVGEN_FETCH_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }

    /// Generator runner with the configured timeout.
    pub fn runner(&self) -> ProcessRunner {
        let runner = ProcessRunner::new(self.generator.clone());
        match self.generator_timeout {
            Some(timeout) => runner.with_timeout(timeout),
            None => runner,
        }
    }

    /// Artifact locator for the configured strategy.
    ///
    /// Relative search and frame directories are resolved against the
    /// generator working directory, since that is where it writes.
    pub fn artifact_locator(&self) -> ArtifactLocator {
        let strategy = match self.artifact_mode {
            ArtifactMode::Search => ArtifactStrategy::Search(SearchLocations::new(
                self.search_dirs.iter().map(|d| self.resolve(d)).collect(),
            )),
            ArtifactMode::Frames => ArtifactStrategy::Frames(FrameAssembly::new(
                self.resolve(&self.frames_dir),
                self.default_fps,
                self.frame_cache_dir.clone(),
            )),
        };
        ArtifactLocator::new(strategy, self.artifact_extension.clone())
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        match &self.generator.working_dir {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.to_path_buf(),
        }
    }
}
