//! Artifact persistence.
//!
//! A backend is chosen once per request (local directory or object store) and
//! handed to the pipeline as `Arc<dyn StorageBackend>`; nothing downstream
//! branches on which one it is.

mod local;
mod object;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;

pub use local::LocalStorage;
pub use object::{ObjectStorage, build_s3_client};

/// Two-operation storage contract.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist `bytes` under `name` and return an opaque locator.
    async fn save(&self, bytes: Vec<u8>, name: &str) -> Result<String, StorageError>;

    /// Make the object named by `locator` available locally, writing to `dest`
    /// when a copy is needed, and return the local path.
    async fn fetch(&self, locator: &str, dest: &Path) -> Result<PathBuf, StorageError>;
}
