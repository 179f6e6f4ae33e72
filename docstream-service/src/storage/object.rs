//! S3 / MinIO object storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    primitives::ByteStream,
};
use tracing::{debug, error, info, warn};

use crate::config::ObjectStoreConfig;
use crate::error::StorageError;

use super::StorageBackend;

/// Prefix that namespaces every artifact key.
const KEY_PREFIX: &str = "file/";

/// Build a path-style S3 client for the configured endpoint.
pub fn build_s3_client(config: &ObjectStoreConfig) -> Client {
    let credentials = Credentials::new(
        &config.access_key,
        &config.secret_key,
        None,
        None,
        "docstream-service",
    );

    let s3_config = aws_sdk_s3::Config::builder()
        .credentials_provider(credentials)
        .region(Region::new(config.region.clone()))
        .endpoint_url(&config.endpoint)
        .force_path_style(true)
        .behavior_version_latest()
        .build();

    Client::from_conf(s3_config)
}

/// Uploads artifacts to one bucket under `file/`, staging each upload in
/// `staging_dir`.
pub struct ObjectStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    staging_dir: PathBuf,
}

impl ObjectStorage {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            staging_dir: staging_dir.into(),
        }
    }

    fn artifact_key(name: &str) -> String {
        format!("{}{}", KEY_PREFIX, name)
    }

    /// Resolve a locator to an object key.
    ///
    /// Accepts `bucket/file/...` (as returned by `save`), a namespaced key
    /// `file/...`, or any path whose base name is the object name.
    fn object_key(&self, locator: &str) -> Result<String, StorageError> {
        let locator = locator
            .strip_prefix(&format!("{}/", self.bucket))
            .filter(|rest| rest.starts_with(KEY_PREFIX))
            .unwrap_or(locator);

        if locator.starts_with(KEY_PREFIX) {
            return Ok(locator.to_string());
        }

        Path::new(locator)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StorageError::InvalidLocator {
                locator: locator.to_string(),
            })
    }

    fn upload_error(&self, key: &str, message: String) -> StorageError {
        error!(
            endpoint = %self.endpoint,
            bucket = %self.bucket,
            key = %key,
            error = %message,
            "Object store upload failed"
        );
        StorageError::Upload {
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message,
        }
    }

    fn download_error(&self, key: &str, message: String) -> StorageError {
        error!(
            endpoint = %self.endpoint,
            bucket = %self.bucket,
            key = %key,
            error = %message,
            "Object store download failed"
        );
        StorageError::Download {
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message,
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn save(&self, bytes: Vec<u8>, name: &str) -> Result<String, StorageError> {
        let key = Self::artifact_key(name);

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| self.upload_error(&key, e.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("docstream-")
            .suffix(".png")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| self.upload_error(&key, e.to_string()))?;
        tokio::fs::write(temp.path(), bytes)
            .await
            .map_err(|e| self.upload_error(&key, e.to_string()))?;

        let body = ByteStream::from_path(temp.path())
            .await
            .map_err(|e| self.upload_error(&key, e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime::IMAGE_PNG.as_ref())
            .body(body)
            .send()
            .await
            .map_err(|e| self.upload_error(&key, e.to_string()))?;

        if let Err(e) = temp.close() {
            warn!(key = %key, error = %e, "Failed to remove temporary upload file");
        }

        debug!(bucket = %self.bucket, key = %key, "Uploaded artifact");
        Ok(format!("{}/{}", self.bucket, key))
    }

    async fn fetch(&self, locator: &str, dest: &Path) -> Result<PathBuf, StorageError> {
        let key = self.object_key(locator)?;
        info!(bucket = %self.bucket, key = %key, "Downloading from object store");

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    warn!(bucket = %self.bucket, key = %key, "Object not found");
                    StorageError::ObjectNotFound {
                        bucket: self.bucket.clone(),
                        key: key.clone(),
                    }
                } else {
                    self.download_error(&key, e.to_string())
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| self.download_error(&key, e.to_string()))?;

        tokio::fs::write(dest, data.into_bytes()).await?;
        Ok(dest.to_path_buf())
    }
}
