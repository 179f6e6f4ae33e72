//! Service configuration.
//! All settings are read once at startup; changing them requires a restart.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_models")]
    pub models: ModelsConfig,

    #[serde(default = "default_pipeline")]
    pub pipeline: PipelineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for artifacts saved with local storage.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Where input documents fetched from the object store are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    #[serde(default = "default_object_store")]
    pub object_store: ObjectStoreConfig,
}

/// S3-compatible object store (MinIO) connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    /// Bucket used when a request does not name one.
    #[serde(default)]
    pub default_bucket: Option<String>,
}

/// Inference server endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_layout_url")]
    pub layout_url: String,

    #[serde(default = "default_ocr_url")]
    pub ocr_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ModelsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// PDF pipeline tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Rasterization density.
    #[serde(default = "default_dpi")]
    pub dpi: u16,

    /// Size of the blocking worker pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Pages whose raster would exceed this edge length are rendered at 72 DPI.
    #[serde(default = "default_max_page_pixels")]
    pub max_page_pixels: u32,
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    50058
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        image_dir: default_image_dir(),
        download_dir: default_download_dir(),
        object_store: default_object_store(),
    }
}

pub(crate) fn default_image_dir() -> PathBuf {
    PathBuf::from("./images")
}

pub(crate) fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

pub(crate) fn default_object_store() -> ObjectStoreConfig {
    ObjectStoreConfig {
        endpoint: default_endpoint(),
        region: default_region(),
        access_key: String::new(),
        secret_key: String::new(),
        default_bucket: None,
    }
}

pub(crate) fn default_endpoint() -> String {
    "http://localhost:9000".to_string()
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

pub(crate) fn default_models() -> ModelsConfig {
    ModelsConfig {
        layout_url: default_layout_url(),
        ocr_url: default_ocr_url(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

pub(crate) fn default_layout_url() -> String {
    "http://localhost:8501".to_string()
}

pub(crate) fn default_ocr_url() -> String {
    "http://localhost:8502".to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_pipeline() -> PipelineConfig {
    PipelineConfig {
        dpi: default_dpi(),
        worker_threads: default_worker_threads(),
        max_page_pixels: default_max_page_pixels(),
    }
}

pub(crate) fn default_dpi() -> u16 {
    200
}

pub(crate) fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub(crate) fn default_max_page_pixels() -> u32 {
    4500
}
