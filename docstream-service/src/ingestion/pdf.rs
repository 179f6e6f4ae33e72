//! PDF document processing.
//!
//! - Rasterization of every page at a fixed DPI
//! - Layout detection and per-region text/artifact extraction
//! - Same-kind overlap resolution per page

pub mod overlap;
pub mod page;
pub mod pipeline;
pub mod raster;
pub mod regions;

use pdfium_render::prelude::*;

use crate::error::ProcessingError;

pub use pipeline::{DocumentPipeline, ExtractionEngines};
pub use raster::PdfiumRasterizer;

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
pub fn create_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ProcessingError::PdfiumUnavailable {
            message: format!("install libpdfium or place it in ./vendor/pdfium/lib/: {:?}", e),
        })?;

    Ok(Pdfium::new(bindings))
}
