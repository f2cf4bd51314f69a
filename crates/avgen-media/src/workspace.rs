//! Job-scoped temporary workspaces.
//!
//! Each job gets its own directory under a shared scratch root, named with a
//! fresh UUID, holding `audio/`, `video/` and `output/` subdirectories. The
//! directory tree is removed exactly once: by [`Workspace::release`] on the
//! normal path, or by `Drop` if the owner goes away without releasing
//! (early return, panic unwinding).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Attempts before giving up on finding an unused directory name.
const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// An allocated job workspace. Exclusively owned by one job.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    audio_dir: PathBuf,
    video_dir: PathBuf,
    output_dir: PathBuf,
    released: bool,
}

impl Workspace {
    /// Allocate a new workspace under `scratch_root`.
    ///
    /// The job directory is created with `create_dir`, so an existing name is
    /// never reused even if two allocations race on the same UUID.
    pub async fn allocate(scratch_root: impl AsRef<Path>) -> MediaResult<Self> {
        let scratch_root = scratch_root.as_ref();
        fs::create_dir_all(scratch_root)
            .await
            .map_err(|e| MediaError::workspace(scratch_root, e))?;

        let mut attempts = 0;
        let root = loop {
            let candidate = scratch_root.join(Uuid::new_v4().to_string());
            match fs::create_dir(&candidate).await {
                Ok(()) => break candidate,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_ALLOCATION_ATTEMPTS => {
                    attempts += 1;
                    warn!(path = %candidate.display(), "Workspace name collision, retrying");
                }
                Err(e) => return Err(MediaError::workspace(candidate, e)),
            }
        };

        // From here on the root exists; Drop removes it if a subdirectory fails.
        let workspace = Self {
            audio_dir: root.join("audio"),
            video_dir: root.join("video"),
            output_dir: root.join("output"),
            root,
            released: false,
        };

        for dir in [&workspace.audio_dir, &workspace.video_dir, &workspace.output_dir] {
            fs::create_dir(dir)
                .await
                .map_err(|e| MediaError::workspace(dir, e))?;
        }

        debug!(path = %workspace.root.display(), "Allocated workspace");
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Recursively remove the workspace.
    ///
    /// Consumes the workspace, so release happens at most once. A tree that is
    /// already gone counts as released.
    pub async fn release(mut self) -> MediaResult<()> {
        self.released = true;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!(path = %self.root.display(), "Released workspace");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::workspace(&self.root, e)),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(path = %self.root.display(), "Released workspace on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "Failed to remove workspace on drop"),
        }
    }
}
