//! Page rasterization using pdfium-render.

use std::path::Path;

use image::RgbImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::ProcessingError;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Turns a document into one RGB raster per page.
///
/// Called from the worker pool; implementations may block.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, path: &Path, dpi: u16) -> Result<Vec<RgbImage>, ProcessingError>;
}

/// Pixel dimensions for a page at `dpi`, falling back to 72 DPI when either
/// edge would exceed `max_edge`. `None` when the page has no area.
pub fn target_dimensions(
    width_pts: f32,
    height_pts: f32,
    dpi: u16,
    max_edge: u32,
) -> Option<(u32, u32)> {
    if !(width_pts.is_finite() && height_pts.is_finite()) || width_pts <= 0.0 || height_pts <= 0.0
    {
        return None;
    }

    let scale = dpi as f32 / POINTS_PER_INCH;
    let mut width = (width_pts * scale).round() as u32;
    let mut height = (height_pts * scale).round() as u32;
    if width > max_edge || height > max_edge {
        width = width_pts.round() as u32;
        height = height_pts.round() as u32;
    }

    (width > 0 && height > 0).then_some((width, height))
}

pub struct PdfiumRasterizer {
    max_page_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_page_pixels: u32) -> Self {
        Self { max_page_pixels }
    }
}

fn rasterization_error(path: &Path, message: String) -> ProcessingError {
    ProcessingError::Rasterization {
        path: path.to_path_buf(),
        source: Box::new(std::io::Error::other(message)),
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, path: &Path, dpi: u16) -> Result<Vec<RgbImage>, ProcessingError> {
        let pdfium = super::create_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| rasterization_error(path, format!("Failed to load PDF: {:?}", e)))?;

        let mut rasters = Vec::with_capacity(document.pages().len() as usize);
        for (index, page) in document.pages().iter().enumerate() {
            let (width, height) = target_dimensions(
                page.width().value,
                page.height().value,
                dpi,
                self.max_page_pixels,
            )
            .ok_or_else(|| ProcessingError::DegenerateGeometry {
                path: path.to_path_buf(),
                page: index,
            })?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);

            let bitmap = page.render_with_config(&config).map_err(|e| {
                rasterization_error(path, format!("Failed to render page {}: {:?}", index, e))
            })?;

            let raster = bitmap.as_image().to_rgb8();
            debug!(
                page = index,
                width = raster.width(),
                height = raster.height(),
                "Rasterized page"
            );
            rasters.push(raster);
        }

        Ok(rasters)
    }
}
