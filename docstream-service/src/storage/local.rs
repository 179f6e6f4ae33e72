//! Local filesystem storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

use super::StorageBackend;

/// Writes artifacts directly under a base directory.
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, bytes: Vec<u8>, name: &str) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let base_dir = tokio::fs::canonicalize(&self.base_dir).await?;
        let path = base_dir.join(name);
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), bytes = size, "Saved artifact locally");
        Ok(path.to_string_lossy().to_string())
    }

    /// Local locators are paths; nothing is copied and `dest` is unused.
    async fn fetch(&self, locator: &str, _dest: &Path) -> Result<PathBuf, StorageError> {
        let path = PathBuf::from(locator);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound { path });
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        if metadata.is_dir() {
            return Err(StorageError::IsDirectory { path });
        }
        if !metadata.is_file() {
            return Err(StorageError::NotFound { path });
        }
        Ok(path)
    }
}
