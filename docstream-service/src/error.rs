use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Document processing failed")]
    Processing(#[from] ProcessingError),

    #[error("Artifact storage failed")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Document processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to rasterize {}", path.display())]
    Rasterization {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("PDFium library unavailable: {message}")]
    PdfiumUnavailable { message: String },

    #[error("Page {page} of {} has degenerate geometry", path.display())]
    DegenerateGeometry { path: PathBuf, page: usize },

    #[error("Failed to encode region image on page {page}")]
    ImageEncode {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Worker task failed: {message}")]
    Worker { message: String },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Artifact storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Path is a directory: {}", path.display())]
    IsDirectory { path: PathBuf },

    #[error("Invalid locator: {locator}")]
    InvalidLocator { locator: String },

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Upload of {bucket}/{key} to {endpoint} failed: {message}")]
    Upload {
        endpoint: String,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Download of {bucket}/{key} from {endpoint} failed: {message}")]
    Download {
        endpoint: String,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// Inference model adapter errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Connection failed to model server at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Inference failed (status {status}): {message}")]
    Inference { status: u16, message: String },

    #[error("Invalid response from model server at {url}")]
    InvalidResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to encode image for inference")]
    Encode(#[source] image::ImageError),

    #[error("Image encoding task failed")]
    EncodeTask(#[source] ProcessingError),
}

/// Status code surfaced to the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidArgument,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::FileNotFound { .. }
            | ServiceError::Storage(StorageError::NotFound { .. })
            | ServiceError::Storage(StorageError::ObjectNotFound { .. }) => ErrorCode::NotFound,
            ServiceError::UnsupportedFormat { .. }
            | ServiceError::InvalidRequest { .. }
            | ServiceError::Storage(StorageError::IsDirectory { .. })
            | ServiceError::Storage(StorageError::InvalidLocator { .. }) => {
                ErrorCode::InvalidArgument
            }
            _ => ErrorCode::Internal,
        }
    }

    /// Body used both for pre-stream error responses and the trailing error record.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: format_error_chain(self),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = self.to_error_response();
        (body.code.http_status(), Json(body)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and its `source()` chain as `outer: inner: root`.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let missing = ServiceError::FileNotFound {
            path: PathBuf::from("/nope.pdf"),
        };
        assert_eq!(missing.code(), ErrorCode::NotFound);

        let unsupported = ServiceError::UnsupportedFormat {
            extension: "docx".to_string(),
        };
        assert_eq!(unsupported.code(), ErrorCode::InvalidArgument);

        let upload = ServiceError::Storage(StorageError::Upload {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "docs".to_string(),
            key: "file/a.png".to_string(),
            message: "connection refused".to_string(),
        });
        assert_eq!(upload.code(), ErrorCode::Internal);
        assert_eq!(
            upload.code().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_format_error_chain_includes_sources() {
        let error = ServiceError::Processing(ProcessingError::Io(std::io::Error::other(
            "disk full",
        )));
        assert_eq!(
            format_error_chain(&error),
            "Document processing failed: IO error: disk full"
        );
    }

    #[test]
    fn test_error_code_serializes_screaming_case() {
        let json = serde_json::to_string(&ErrorCode::InvalidArgument).unwrap();
        assert_eq!(json, "\"INVALID_ARGUMENT\"");
        assert_eq!(ErrorCode::NotFound.as_str(), "NOT_FOUND");
    }
}
