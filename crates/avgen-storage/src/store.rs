//! Object store abstraction.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Upload-by-path object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key` and return its public URL.
    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String>;
}
