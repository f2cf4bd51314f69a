//! Directory search for a generated media file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Candidate directories scanned after the workspace output directory.
#[derive(Debug, Clone, Default)]
pub struct SearchLocations {
    dirs: Vec<PathBuf>,
}

impl SearchLocations {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Return the first file with `extension`, scanning `first` and then each
    /// configured directory in order. Within a directory the lexicographically
    /// smallest filename wins. Missing directories are skipped.
    pub async fn find(&self, first: &Path, extension: &str) -> MediaResult<PathBuf> {
        let order = std::iter::once(first).chain(self.dirs.iter().map(PathBuf::as_path));

        for dir in order {
            if let Some(found) = first_match(dir, extension).await? {
                debug!(dir = %dir.display(), path = %found.display(), "Found artifact candidate");
                return Ok(found);
            }
        }

        let scanned: Vec<String> = std::iter::once(first)
            .chain(self.dirs.iter().map(PathBuf::as_path))
            .map(|d| d.display().to_string())
            .collect();
        Err(MediaError::artifact_not_found(format!(
            "no .{} file in [{}]",
            extension,
            scanned.join(", ")
        )))
    }
}

async fn first_match(dir: &Path, extension: &str) -> MediaResult<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && has_extension(&path, extension) {
            matches.push(path);
        }
    }

    matches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(matches.into_iter().next())
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
