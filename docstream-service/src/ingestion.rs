//! Document ingestion: format resolution and per-format extraction.

pub mod pdf;
pub mod text;
pub mod types;

use std::path::Path;

use mime::Mime;

use crate::error::{ServiceError, ServiceResult};

pub use pdf::{DocumentPipeline, ExtractionEngines, PdfiumRasterizer};
pub use types::{ArtifactKind, Chunk, ChunkContent};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Pdf,
    Txt,
    Markdown,
}

impl DocumentKind {
    /// Resolve the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> ServiceResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" => Ok(DocumentKind::Txt),
            "md" | "markdown" => Ok(DocumentKind::Markdown),
            _ => Err(ServiceError::UnsupportedFormat { extension }),
        }
    }

    pub fn mime(&self) -> Mime {
        match self {
            DocumentKind::Pdf => mime::APPLICATION_PDF,
            DocumentKind::Txt => mime::TEXT_PLAIN_UTF_8,
            DocumentKind::Markdown => "text/markdown; charset=utf-8"
                .parse()
                .unwrap_or(mime::TEXT_PLAIN_UTF_8),
        }
    }
}
