//! Document-level orchestration: files → pages → chunks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use image::RgbImage;
use tokio_stream::wrappers::ReadDirStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProcessingError, ServiceError, ServiceResult, format_error_chain};
use crate::ingestion::types::Chunk;
use crate::models::{LayoutDetector, TextRecognizer};
use crate::storage::StorageBackend;
use crate::worker_pool::WorkerPool;

use super::page::PageProcessor;
use super::raster::Rasterizer;

/// Process-wide engine handles shared by every request.
#[derive(Clone)]
pub struct ExtractionEngines {
    pub layout: Arc<dyn LayoutDetector>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub pool: WorkerPool,
}

/// Streams one `Vec<Chunk>` per page, in page order.
#[derive(Clone)]
pub struct DocumentPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    pool: WorkerPool,
    pages: Arc<PageProcessor>,
    dpi: u16,
}

impl DocumentPipeline {
    pub fn new(engines: ExtractionEngines, storage: Arc<dyn StorageBackend>, dpi: u16) -> Self {
        let pages = PageProcessor::new(engines.layout, engines.ocr, storage, engines.pool.clone());
        Self {
            rasterizer: engines.rasterizer,
            pool: engines.pool,
            pages: Arc::new(pages),
            dpi,
        }
    }

    /// Parse a file, or every regular file of a directory in name order.
    ///
    /// Nothing runs until the stream is polled. Files that fail to rasterize
    /// are skipped. `cancel` is checked before each page; once it fires the
    /// stream ends without scheduling more work.
    pub fn parse_document(
        &self,
        path: PathBuf,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ServiceResult<Vec<Chunk>>> + Send + 'static {
        let pipeline = self.clone();

        try_stream! {
            let files = resolve_inputs(&path).await?;
            debug!(path = %path.display(), files = files.len(), "Resolved document inputs");

            'files: for file in files {
                let rasters = match pipeline.rasterize(&file).await {
                    Ok(rasters) => rasters,
                    Err(e) => {
                        metrics::counter!("docstream_files_skipped_total").increment(1);
                        warn!(
                            file = %file.display(),
                            error = %format_error_chain(&e),
                            "Skipping file that could not be rasterized"
                        );
                        continue;
                    }
                };

                let total_pages = rasters.len();
                info!(file = %file.display(), pages = total_pages, dpi = pipeline.dpi, "Processing document");

                for (page_index, raster) in rasters.into_iter().enumerate() {
                    if cancel.is_cancelled() {
                        info!(file = %file.display(), page = page_index, "Parse cancelled");
                        break 'files;
                    }
                    let chunks = pipeline.pages.process_page(raster, page_index, total_pages).await?;
                    yield chunks;
                }
            }
        }
    }

    async fn rasterize(&self, file: &Path) -> Result<Vec<RgbImage>, ProcessingError> {
        let rasterizer = self.rasterizer.clone();
        let file = file.to_path_buf();
        let dpi = self.dpi;
        self.pool
            .run(move || rasterizer.rasterize(&file, dpi))
            .await
            .and_then(|rasters| rasters)
    }
}

async fn resolve_inputs(path: &Path) -> ServiceResult<Vec<PathBuf>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServiceError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(ProcessingError::Io(e).into()),
    };

    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let read_dir = tokio::fs::read_dir(path).await.map_err(ProcessingError::Io)?;
    let mut entries = ReadDirStream::new(read_dir);
    let mut files = Vec::new();
    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(ProcessingError::Io)?;
        let file_type = entry.file_type().await.map_err(ProcessingError::Io)?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
