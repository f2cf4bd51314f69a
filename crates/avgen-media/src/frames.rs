//! Process-wide frame encoder environment.
//!
//! Frame assembly needs an FFmpeg binary and a cache directory for encoder
//! output before it is moved into a workspace. Both are resolved once per
//! process; later calls return the first environment unchanged.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::info;

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

static FRAME_ENVIRONMENT: OnceLock<FrameEnvironment> = OnceLock::new();

/// Resolved encoder environment.
#[derive(Debug, Clone)]
pub struct FrameEnvironment {
    pub ffmpeg: PathBuf,
    pub cache_dir: PathBuf,
}

/// Initialize the frame encoder environment. Idempotent.
pub fn init_frame_environment(cache_dir: impl AsRef<Path>) -> MediaResult<&'static FrameEnvironment> {
    if let Some(env) = FRAME_ENVIRONMENT.get() {
        return Ok(env);
    }

    let cache_dir = cache_dir.as_ref().to_path_buf();
    std::fs::create_dir_all(&cache_dir).map_err(|e| MediaError::workspace(&cache_dir, e))?;
    let ffmpeg = check_ffmpeg()?;

    let env = FRAME_ENVIRONMENT.get_or_init(|| FrameEnvironment { ffmpeg, cache_dir });
    info!(
        ffmpeg = %env.ffmpeg.display(),
        cache_dir = %env.cache_dir.display(),
        "Frame encoder environment ready"
    );
    Ok(env)
}
