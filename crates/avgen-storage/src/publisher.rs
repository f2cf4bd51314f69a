//! Artifact publishing.
//!
//! A [`Publisher`] is either backed by a configured object store or explicitly
//! unconfigured. Callers branch on the variant; an unconfigured publisher
//! skips the upload instead of failing it.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::client::{R2Client, R2Config};
use crate::error::StorageResult;
use crate::keys::{content_type_for, UploadKey};
use crate::store::ObjectStore;

/// Result of a publish attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Uploaded; `url` is the public URL of `key`
    Published { key: UploadKey, url: String },
    /// No store configured
    Skipped { reason: String },
}

/// Uploads canonical artifacts under fresh keys.
#[derive(Clone)]
pub enum Publisher {
    Configured {
        store: Arc<dyn ObjectStore>,
        prefix: String,
    },
    Unconfigured {
        reason: String,
    },
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Publisher::Configured { prefix, .. } => {
                f.debug_struct("Configured").field("prefix", prefix).finish()
            }
            Publisher::Unconfigured { reason } => {
                f.debug_struct("Unconfigured").field("reason", reason).finish()
            }
        }
    }
}

impl Publisher {
    pub fn configured(store: impl ObjectStore + 'static, prefix: impl Into<String>) -> Self {
        Publisher::Configured {
            store: Arc::new(store),
            prefix: prefix.into(),
        }
    }

    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Publisher::Unconfigured {
            reason: reason.into(),
        }
    }

    /// Build from `R2_*` environment variables, falling back to unconfigured.
    pub async fn from_env(prefix: impl Into<String>) -> Self {
        let config = match R2Config::from_env() {
            Ok(config) => config,
            Err(e) => {
                warn!("Object store not configured, uploads will be skipped: {}", e);
                return Publisher::unconfigured(e.to_string());
            }
        };

        match R2Client::new(config).await {
            Ok(client) => {
                info!(bucket = client.bucket(), "Object store configured");
                Publisher::configured(client, prefix)
            }
            Err(e) => {
                warn!("Object store client failed to initialize: {}", e);
                Publisher::unconfigured(e.to_string())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Publisher::Configured { .. })
    }

    /// Upload `path` under a fresh `{prefix}/{uuid}.{ext}` key.
    ///
    /// Upload errors are returned as-is; nothing is retried here.
    pub async fn publish(&self, path: &Path) -> StorageResult<PublishOutcome> {
        let (store, prefix) = match self {
            Publisher::Configured { store, prefix } => (store, prefix),
            Publisher::Unconfigured { reason } => {
                return Ok(PublishOutcome::Skipped {
                    reason: reason.clone(),
                })
            }
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let key = UploadKey::generate(prefix, &extension);

        let url = store
            .upload(path, key.as_str(), content_type_for(&extension))
            .await?;

        info!(key = %key, url = %url, "Published artifact");
        Ok(PublishOutcome::Published { key, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        uploads: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ObjectStore for Arc<RecordingStore> {
        async fn upload(&self, _path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
            self.uploads
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string()));
            Ok(format!("https://cdn.example.com/{}", key))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn upload(&self, _path: &Path, _key: &str, _content_type: &str) -> StorageResult<String> {
            Err(StorageError::upload_failed("AccessDenied"))
        }
    }

    #[tokio::test]
    async fn test_publish_uses_prefixed_key() {
        let store = Arc::new(RecordingStore::default());
        let publisher = Publisher::configured(Arc::clone(&store), "serverless");

        let outcome = publisher.publish(Path::new("/w/output/output.mp4")).await.unwrap();

        match outcome {
            PublishOutcome::Published { key, url } => {
                assert!(key.as_str().starts_with("serverless/"));
                assert!(key.as_str().ends_with(".mp4"));
                assert_eq!(url, format!("https://cdn.example.com/{}", key));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, "video/mp4");
    }

    #[tokio::test]
    async fn test_same_file_twice_gets_distinct_keys() {
        let store = Arc::new(RecordingStore::default());
        let publisher = Publisher::configured(Arc::clone(&store), "serverless");
        let path = Path::new("/w/output/output.mp4");

        publisher.publish(path).await.unwrap();
        publisher.publish(path).await.unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_ne!(uploads[0].0, uploads[1].0);
    }

    #[tokio::test]
    async fn test_extension_is_lowercased() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("output.MOV");
        tokio::fs::write(&path, b"mov").await.unwrap();

        let store = Arc::new(RecordingStore::default());
        let publisher = Publisher::configured(Arc::clone(&store), "renders/");
        publisher.publish(&path).await.unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert!(uploads[0].0.starts_with("renders/"));
        assert!(uploads[0].0.ends_with(".mov"));
        assert_eq!(uploads[0].1, "video/quicktime");
    }

    #[tokio::test]
    async fn test_unconfigured_skips() {
        let publisher = Publisher::unconfigured("missing R2_BUCKET_NAME");
        assert!(!publisher.is_configured());

        let outcome = publisher.publish(Path::new("/w/output/output.mp4")).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::Skipped {
                reason: "missing R2_BUCKET_NAME".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_upload_error_propagates() {
        let publisher = Publisher::configured(FailingStore, "serverless");
        let err = publisher
            .publish(Path::new("/w/output/output.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }
}
