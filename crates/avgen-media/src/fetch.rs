//! Source retrieval into a job workspace.
//!
//! Remote bodies are streamed to disk through a fixed-size buffer so that
//! large media files never sit in memory. `file://` URIs and local paths
//! (relative ones resolve against the current directory) are copied instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Buffer size used when streaming a download to disk (1 MiB).
pub const FETCH_CHUNK_SIZE: usize = 1024 * 1024;

/// Filename used when the URI path has no usable last segment.
const FALLBACK_FILE_NAME: &str = "input";

/// A source staged on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInput {
    pub local_path: PathBuf,
    pub origin_uri: String,
}

/// Retrieves sources into local directories.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher that gives up when connecting, or when the server
    /// sends nothing, for longer than `timeout`.
    ///
    /// There is no limit on the total transfer time; a slow but steady
    /// download of a large file runs to completion.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| MediaError::retrieval_failed("<client>", e))?;
        Ok(Self { client })
    }

    /// Fetch `uri` into `dest_dir`, creating the directory if needed.
    ///
    /// The local filename is the last segment of the URI path.
    pub async fn fetch(&self, uri: &str, dest_dir: impl AsRef<Path>) -> MediaResult<StagedInput> {
        let dest_dir = dest_dir.as_ref();
        fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| MediaError::retrieval_failed(uri, format!("cannot create {}: {}", dest_dir.display(), e)))?;

        let local_path = match Url::parse(uri) {
            Ok(url) => match url.scheme() {
                "http" | "https" => {
                    let path = dest_dir.join(local_file_name(&url));
                    self.download(uri, url, &path).await?;
                    path
                }
                "file" => {
                    let source = url
                        .to_file_path()
                        .map_err(|_| MediaError::UnsupportedSource(uri.to_string()))?;
                    copy_local(uri, &source, dest_dir).await?
                }
                _ => return Err(MediaError::UnsupportedSource(uri.to_string())),
            },
            Err(_) => copy_local(uri, Path::new(uri), dest_dir).await?,
        };

        Ok(StagedInput {
            local_path,
            origin_uri: uri.to_string(),
        })
    }

    async fn download(&self, uri: &str, url: Url, path: &Path) -> MediaResult<()> {
        debug!(uri = %uri, path = %path.display(), "Downloading source");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::retrieval_failed(uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::retrieval_failed(uri, format!("HTTP {}", status)));
        }

        let file = fs::File::create(path)
            .await
            .map_err(|e| MediaError::retrieval_failed(uri, e))?;
        let mut writer = BufWriter::with_capacity(FETCH_CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MediaError::retrieval_failed(uri, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| MediaError::retrieval_failed(uri, e))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| MediaError::retrieval_failed(uri, e))?;

        info!(
            uri = %uri,
            path = %path.display(),
            size_mb = written as f64 / (1024.0 * 1024.0),
            "Downloaded source"
        );
        Ok(())
    }
}

async fn copy_local(uri: &str, source: &Path, dest_dir: &Path) -> MediaResult<PathBuf> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| is_safe_name(n))
        .unwrap_or(FALLBACK_FILE_NAME);
    let path = dest_dir.join(name);

    fs::copy(source, &path)
        .await
        .map_err(|e| MediaError::retrieval_failed(uri, e))?;

    debug!(uri = %uri, path = %path.display(), "Copied local source");
    Ok(path)
}

/// Derive the local filename from the last segment of the URL path.
pub fn local_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    if is_safe_name(&decoded) {
        decoded
    } else {
        FALLBACK_FILE_NAME.to_string()
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
