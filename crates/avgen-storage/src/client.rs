//! R2 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for R2 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public URL prefix objects are served from
    pub public_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from any variable source. Empty values count as unset.
    ///
    /// The endpoint is `R2_ENDPOINT_URL`, or derived from `R2_ACCOUNT_ID`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut missing = Vec::new();
        let mut required = |name: &'static str| {
            let value = get(name);
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let access_key_id = required("R2_ACCESS_KEY_ID");
        let secret_access_key = required("R2_SECRET_ACCESS_KEY");
        let bucket_name = required("R2_BUCKET_NAME");
        let public_url = required("R2_PUBLIC_URL");

        let endpoint_url = match (get("R2_ENDPOINT_URL"), get("R2_ACCOUNT_ID")) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("https://{}.r2.cloudflarestorage.com", account),
            (None, None) => {
                missing.push("R2_ENDPOINT_URL or R2_ACCOUNT_ID");
                String::new()
            }
        };

        if !missing.is_empty() {
            return Err(StorageError::config_error(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            endpoint_url,
            access_key_id,
            secret_access_key,
            bucket_name,
            region: get("R2_REGION").unwrap_or_else(|| "auto".to_string()),
            public_url,
        })
    }

    /// Public URL of an object key.
    pub fn public_url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    config: R2Config,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            config,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    /// Upload a file to R2 and return its public URL.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let path = path.as_ref();
        if tokio::fs::metadata(path).await.is_err() {
            return Err(StorageError::not_found(path.display().to_string()));
        }
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{} -> {}: {}", path.display(), key, e)))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(self.config.public_url_for(key))
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn upload(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
        self.upload_file(path, key, content_type).await
    }
}
