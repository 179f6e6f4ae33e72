//! Per-page extraction: layout detection, region dispatch, overlap resolution.
//!
//! Every non-ignored region becomes one task. Artifact tasks (figures, tables,
//! formulas) crop the raster, encode it as PNG and persist it. Text tasks
//! paste the region onto a blank page-sized canvas and run OCR on it. All
//! tasks of a page run concurrently; OCR calls go through a per-page lock
//! since the engine is not reentrant.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use image::{ImageFormat, Rgb, RgbImage, imageops};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{ProcessingError, ServiceResult, format_error_chain};
use crate::ingestion::types::{ArtifactKind, BoundingBox, Chunk, PageContext, PageSize};
use crate::models::{LayoutDetector, TextRecognizer, merge_lines};
use crate::storage::StorageBackend;
use crate::worker_pool::WorkerPool;

use super::overlap::{PAGE_OVERLAP_THRESHOLD, resolve_overlaps};
use super::regions::{IGNORED_CATEGORY_IDS, Region, RegionRoute, count_regions};

const CANVAS_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

pub struct PageProcessor {
    layout: Arc<dyn LayoutDetector>,
    ocr: Arc<dyn TextRecognizer>,
    storage: Arc<dyn StorageBackend>,
    pool: WorkerPool,
}

impl PageProcessor {
    pub fn new(
        layout: Arc<dyn LayoutDetector>,
        ocr: Arc<dyn TextRecognizer>,
        storage: Arc<dyn StorageBackend>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            layout,
            ocr,
            storage,
            pool,
        }
    }

    /// Extract the chunks of one page.
    ///
    /// The result is in detection order with duplicates removed. Text
    /// recognition failures drop the region; artifact persistence failures
    /// fail the page.
    pub async fn process_page(
        &self,
        raster: RgbImage,
        page_index: usize,
        total_pages: usize,
    ) -> ServiceResult<Vec<Chunk>> {
        let started = Instant::now();
        let raster = Arc::new(raster);
        let (width, height) = raster.dimensions();

        let layout = self
            .layout
            .detect(raster.clone(), &IGNORED_CATEGORY_IDS)
            .await?;

        let page = PageContext {
            page_index,
            page_size: PageSize { width, height },
            total_pages,
            region_count: count_regions(&layout.detections),
        };

        let ocr_lock = Mutex::new(());
        let mut tasks: Vec<BoxFuture<'_, ServiceResult<Option<Chunk>>>> = Vec::new();

        for detection in &layout.detections {
            let region = Region::from_detection(detection);
            if matches!(region.route, RegionRoute::Ignored | RegionRoute::Skip) {
                trace!(
                    page = page_index,
                    category_id = detection.category_id,
                    "Skipping region without a chunk mapping"
                );
                continue;
            }

            let crop = region.bbox.clamp_to(width, height);
            if crop.is_degenerate() {
                warn!(
                    page = page_index,
                    category_id = detection.category_id,
                    bbox = ?region.bbox.as_array(),
                    "Skipping degenerate region"
                );
                continue;
            }

            match region.route {
                RegionRoute::Artifact(kind) => tasks.push(
                    self.extract_artifact(raster.clone(), kind, region.bbox, crop, page)
                        .boxed(),
                ),
                RegionRoute::Text => tasks.push(
                    self.extract_text(raster.clone(), region.bbox, crop, page, &ocr_lock)
                        .boxed(),
                ),
                RegionRoute::Ignored | RegionRoute::Skip => {}
            }
        }

        let scheduled = tasks.len();
        let chunks: Vec<Chunk> = try_join_all(tasks).await?.into_iter().flatten().collect();
        let extracted = chunks.len();
        let resolved = resolve_overlaps(chunks, PAGE_OVERLAP_THRESHOLD);

        metrics::counter!("docstream_pages_processed_total").increment(1);
        debug!(
            page = page_index,
            regions = page.region_count,
            scheduled,
            extracted,
            emitted = resolved.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Page processed"
        );

        Ok(resolved)
    }

    async fn extract_artifact(
        &self,
        raster: Arc<RgbImage>,
        kind: ArtifactKind,
        bbox: BoundingBox,
        crop: BoundingBox,
        page: PageContext,
    ) -> ServiceResult<Option<Chunk>> {
        let png = self
            .pool
            .run(move || encode_region_png(&raster, &crop))
            .await?
            .map_err(|source| ProcessingError::ImageEncode {
                page: page.page_index,
                source,
            })?;

        let name = artifact_file_name(page.page_index, kind, &bbox);
        let locator = self.storage.save(png, &name).await?;

        debug!(page = page.page_index, kind = %kind, locator = %locator, "Saved artifact");
        Ok(Some(Chunk::artifact(kind, locator, bbox, page)))
    }

    async fn extract_text(
        &self,
        raster: Arc<RgbImage>,
        bbox: BoundingBox,
        crop: BoundingBox,
        page: PageContext,
        ocr_lock: &Mutex<()>,
    ) -> ServiceResult<Option<Chunk>> {
        let canvas = match self.pool.run(move || isolate_region(&raster, &crop)).await {
            Ok(canvas) => Arc::new(canvas),
            Err(e) => {
                warn!(page = page.page_index, error = %e, "Failed to prepare region for OCR");
                return Ok(None);
            }
        };

        let recognized = {
            let _guard = ocr_lock.lock().await;
            self.ocr.recognize(canvas).await
        };

        match recognized {
            Ok(lines) => {
                let text = merge_lines(&lines);
                if text.is_empty() {
                    trace!(page = page.page_index, bbox = ?bbox.as_array(), "OCR found no text");
                    Ok(None)
                } else {
                    Ok(Some(Chunk::text(text, bbox, page)))
                }
            }
            Err(e) => {
                metrics::counter!("docstream_ocr_failures_total").increment(1);
                warn!(
                    page = page.page_index,
                    bbox = ?bbox.as_array(),
                    error = %format_error_chain(&e),
                    "OCR failed, dropping region"
                );
                Ok(None)
            }
        }
    }
}

/// `page_{n}_{kind}_{xmin}_{ymin}.png` with a 1-based page number.
pub fn artifact_file_name(page_index: usize, kind: ArtifactKind, bbox: &BoundingBox) -> String {
    format!(
        "page_{}_{}_{}_{}.png",
        page_index + 1,
        kind.as_ref().to_lowercase(),
        bbox.xmin,
        bbox.ymin
    )
}

fn crop_region(raster: &RgbImage, crop: &BoundingBox) -> RgbImage {
    imageops::crop_imm(
        raster,
        crop.xmin as u32,
        crop.ymin as u32,
        crop.width() as u32,
        crop.height() as u32,
    )
    .to_image()
}

fn encode_region_png(raster: &RgbImage, crop: &BoundingBox) -> Result<Vec<u8>, image::ImageError> {
    let region = crop_region(raster, crop);
    let mut buffer = Cursor::new(Vec::new());
    region.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// A white page-sized canvas holding only the region, at its original position.
fn isolate_region(raster: &RgbImage, crop: &BoundingBox) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(raster.width(), raster.height(), CANVAS_BACKGROUND);
    let region = crop_region(raster, crop);
    imageops::replace(&mut canvas, &region, crop.xmin as i64, crop.ymin as i64);
    canvas
}
