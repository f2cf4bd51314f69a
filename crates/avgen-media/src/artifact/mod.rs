//! Output artifact discovery.
//!
//! The generator does not report where it wrote its result. Two strategies
//! recover it, chosen by deployment configuration:
//! - [`SearchLocations`]: scan candidate directories for a media file
//! - [`FrameAssembly`]: encode a directory of frame images into one file
//!
//! Either way the artifact ends up at the workspace's canonical output path.

mod assembly;
mod search;

use std::path::PathBuf;

use tracing::info;

pub use assembly::{validate_frame_order, FrameAssembly, FRAME_EXTENSIONS};
pub use search::SearchLocations;

use crate::error::MediaResult;
use crate::fs_utils::move_file;
use crate::workspace::Workspace;

/// Canonical artifact file stem inside the workspace output directory.
pub const CANONICAL_STEM: &str = "output";

/// How the artifact is recovered.
#[derive(Debug, Clone)]
pub enum ArtifactStrategy {
    Search(SearchLocations),
    Frames(FrameAssembly),
}

impl ArtifactStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactStrategy::Search(_) => "search",
            ArtifactStrategy::Frames(_) => "frames",
        }
    }
}

/// Locates the generator output and normalizes it to one canonical file.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    strategy: ArtifactStrategy,
    extension: String,
}

impl ArtifactLocator {
    pub fn new(strategy: ArtifactStrategy, extension: impl Into<String>) -> Self {
        Self {
            strategy,
            extension: extension.into().trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn strategy(&self) -> &ArtifactStrategy {
        &self.strategy
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Where the artifact lives once located.
    pub fn canonical_path(&self, workspace: &Workspace) -> PathBuf {
        workspace
            .output_dir()
            .join(format!("{}.{}", CANONICAL_STEM, self.extension))
    }

    /// Find (or assemble) the artifact and move it to the canonical path.
    ///
    /// `fps` overrides the frame assembly default; the search strategy ignores it.
    pub async fn locate(&self, workspace: &Workspace, fps: Option<u32>) -> MediaResult<PathBuf> {
        let produced = match &self.strategy {
            ArtifactStrategy::Search(locations) => {
                locations.find(workspace.output_dir(), &self.extension).await?
            }
            ArtifactStrategy::Frames(assembly) => assembly.assemble(fps, &self.extension).await?,
        };

        let canonical = self.canonical_path(workspace);
        move_file(&produced, &canonical).await?;

        info!(
            strategy = self.strategy.name(),
            source = %produced.display(),
            path = %canonical.display(),
            "Artifact located"
        );
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn test_locate_moves_found_file_to_canonical_path() {
        let scratch = TempDir::new().unwrap();
        let results = TempDir::new().unwrap();
        fs::write(results.path().join("b_result.mp4"), b"generated").await.unwrap();

        let workspace = Workspace::allocate(scratch.path()).await.unwrap();
        let locator = ArtifactLocator::new(
            ArtifactStrategy::Search(SearchLocations::new(vec![results.path().to_path_buf()])),
            ".MP4",
        );

        let path = locator.locate(&workspace, None).await.unwrap();

        assert_eq!(path, workspace.output_dir().join("output.mp4"));
        assert_eq!(fs::read(&path).await.unwrap(), b"generated");
        assert!(!results.path().join("b_result.mp4").exists());
    }

    #[tokio::test]
    async fn test_locate_accepts_canonical_file_in_place() {
        let scratch = TempDir::new().unwrap();
        let workspace = Workspace::allocate(scratch.path()).await.unwrap();
        fs::write(workspace.output_dir().join("output.mp4"), b"x").await.unwrap();

        let locator = ArtifactLocator::new(
            ArtifactStrategy::Search(SearchLocations::new(Vec::new())),
            "mp4",
        );
        let path = locator.locate(&workspace, None).await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_locate_without_artifact() {
        let scratch = TempDir::new().unwrap();
        let workspace = Workspace::allocate(scratch.path()).await.unwrap();
        let locator = ArtifactLocator::new(
            ArtifactStrategy::Search(SearchLocations::new(vec![scratch.path().join("missing")])),
            "mp4",
        );

        let err = locator.locate(&workspace, None).await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn test_frames_strategy_without_frames() {
        let scratch = TempDir::new().unwrap();
        let frames = TempDir::new().unwrap();
        let workspace = Workspace::allocate(scratch.path()).await.unwrap();
        let locator = ArtifactLocator::new(
            ArtifactStrategy::Frames(FrameAssembly::new(frames.path(), 25, scratch.path().join("cache"))),
            "mp4",
        );

        let err = locator.locate(&workspace, Some(30)).await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactNotFound(_)));
    }
}
