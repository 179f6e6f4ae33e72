mod messages;

pub use messages::{ChunkMessage, PageInfo, ParseRequest, Payload, StorageType, StreamError};

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt, stream};
use tempfile::TempPath;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{ServiceError, ServiceResult, StorageError};
use crate::ingestion::{DocumentKind, DocumentPipeline, ExtractionEngines, text};
use crate::storage::{LocalStorage, ObjectStorage, StorageBackend};

/// Chunk messages of one request, in emission order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ServiceResult<ChunkMessage>> + Send>>;

/// Main service coordinator
pub struct ParseService {
    engines: ExtractionEngines,
    storage: StorageConfig,
    s3: aws_sdk_s3::Client,
    dpi: u16,
}

impl ParseService {
    pub fn new(
        engines: ExtractionEngines,
        storage: StorageConfig,
        s3: aws_sdk_s3::Client,
        dpi: u16,
    ) -> Self {
        Self {
            engines,
            storage,
            s3,
            dpi,
        }
    }

    /// Validate and resolve the request, then stream its chunks.
    ///
    /// Input resolution and format checks happen before the stream is
    /// returned, so their errors reach the caller as a plain `Err`.
    pub async fn parse(
        &self,
        request: ParseRequest,
        cancel: CancellationToken,
    ) -> ServiceResult<ChunkStream> {
        if request.file_path.trim().is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "file_path is required".to_string(),
            });
        }

        let storage = self.storage_for(&request)?;
        let download = match request.storage_type {
            StorageType::Local => None,
            StorageType::Minio => Some(self.download_file(&request.file_path).await?),
        };
        let dest = download.as_deref().unwrap_or(Path::new(""));
        let path = storage.fetch(&request.file_path, dest).await?;
        let kind = DocumentKind::from_path(&path)?;

        metrics::counter!("docstream_requests_total", "kind" => kind.to_string()).increment(1);
        info!(
            path = %path.display(),
            kind = %kind,
            mime = %kind.mime(),
            storage = %request.storage_type,
            "Parsing document"
        );

        let messages: ChunkStream = match kind {
            DocumentKind::Pdf => {
                let pipeline = DocumentPipeline::new(self.engines.clone(), storage, self.dpi);
                let messages = pipeline.parse_document(path, cancel).flat_map(|page| {
                    let messages: Vec<ServiceResult<ChunkMessage>> = match page {
                        Ok(chunks) => chunks.iter().map(|c| Ok(ChunkMessage::from(c))).collect(),
                        Err(e) => vec![Err(e)],
                    };
                    stream::iter(messages)
                });
                Box::pin(messages)
            }
            DocumentKind::Txt | DocumentKind::Markdown => Box::pin(text_messages(path)),
        };

        let messages: ChunkStream = match download {
            Some(download) => Box::pin(holding_download(messages, download)),
            None => messages,
        };
        Ok(messages)
    }

    fn storage_for(&self, request: &ParseRequest) -> ServiceResult<Arc<dyn StorageBackend>> {
        match request.storage_type {
            StorageType::Local => Ok(Arc::new(LocalStorage::new(&self.storage.image_dir))),
            StorageType::Minio => {
                let bucket = request
                    .bucket
                    .as_deref()
                    .filter(|b| !b.trim().is_empty())
                    .or(self.storage.object_store.default_bucket.as_deref())
                    .ok_or_else(|| ServiceError::InvalidRequest {
                        message: "bucket is required for MINIO storage".to_string(),
                    })?;
                Ok(Arc::new(ObjectStorage::new(
                    self.s3.clone(),
                    &self.storage.object_store.endpoint,
                    bucket,
                    &self.storage.download_dir,
                )))
            }
        }
    }

    /// Reserve a uniquely named file in the download directory. The file
    /// keeps the locator's extension and is removed when the path is dropped.
    async fn download_file(&self, locator: &str) -> ServiceResult<TempPath> {
        let dir = &self.storage.download_dir;
        tokio::fs::create_dir_all(dir).await.map_err(StorageError::Io)?;

        let suffix = Path::new(locator)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("docstream-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(StorageError::Io)?;

        debug!(locator = %locator, path = %file.path().display(), "Reserved download file");
        Ok(file.into_temp_path())
    }
}

/// Keep the downloaded input on disk for as long as its chunks are streamed.
fn holding_download(
    mut messages: ChunkStream,
    download: TempPath,
) -> impl Stream<Item = ServiceResult<ChunkMessage>> + Send + 'static {
    async_stream::stream! {
        let _download = download;
        while let Some(message) = messages.next().await {
            yield message;
        }
    }
}

fn text_messages(path: PathBuf) -> impl Stream<Item = ServiceResult<ChunkMessage>> + Send + 'static {
    try_stream! {
        for chunk in text::extract_text(&path).await? {
            yield ChunkMessage::from(&chunk);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ObjectStoreConfig;
    use crate::error::{ErrorCode, ProcessingError};
    use crate::ingestion::pdf::raster::Rasterizer;
    use crate::ingestion::pdf::page::tests::{
        FakeLayout, FakeOcr, RED, detection, painted_page,
    };
    use crate::worker_pool::WorkerPool;
    use image::RgbImage;

    struct OnePageRasterizer;

    impl Rasterizer for OnePageRasterizer {
        fn rasterize(&self, _path: &Path, _dpi: u16) -> Result<Vec<RgbImage>, ProcessingError> {
            Ok(vec![painted_page(&[((0, 0, 40, 10), RED)])])
        }
    }

    pub(crate) fn service(root: &Path, default_bucket: Option<&str>) -> ParseService {
        service_at(root, default_bucket, "http://localhost:9000")
    }

    fn service_at(root: &Path, default_bucket: Option<&str>, endpoint: &str) -> ParseService {
        let engines = ExtractionEngines {
            layout: Arc::new(FakeLayout {
                detections: vec![
                    detection(1, (0.0, 0.0, 40.0, 10.0)),
                    detection(3, (50.0, 50.0, 90.0, 90.0)),
                ],
            }),
            ocr: Arc::new(FakeOcr::default()),
            rasterizer: Arc::new(OnePageRasterizer),
            pool: WorkerPool::new(2),
        };
        let object_store = ObjectStoreConfig {
            endpoint: endpoint.to_string(),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            default_bucket: default_bucket.map(str::to_string),
        };
        let s3 = crate::storage::build_s3_client(&object_store);
        let storage = StorageConfig {
            image_dir: root.join("images"),
            download_dir: root.join("downloads"),
            object_store,
        };
        ParseService::new(engines, storage, s3, 200)
    }

    fn local(path: &Path) -> ParseRequest {
        ParseRequest {
            file_path: path.to_string_lossy().to_string(),
            storage_type: StorageType::Local,
            bucket: None,
        }
    }

    async fn collect(stream: ChunkStream) -> Vec<ChunkMessage> {
        stream.map(|m| m.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), None);

        let result = service
            .parse(local(&dir.path().join("missing.pdf")), CancellationToken::new())
            .await;
        let Err(err) = result else {
            panic!("expected an error");
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_directory_and_unknown_format_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), None);
        let sheet = dir.path().join("sheet.xlsx");
        std::fs::write(&sheet, "x").unwrap();

        for path in [dir.path().to_path_buf(), sheet] {
            let Err(err) = service.parse(local(&path), CancellationToken::new()).await else {
                panic!("expected an error for {}", path.display());
            };
            assert_eq!(err.code(), ErrorCode::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn test_minio_without_bucket_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), None);
        let request = ParseRequest {
            file_path: "file/report.pdf".to_string(),
            storage_type: StorageType::Minio,
            bucket: Some("  ".to_string()),
        };

        let Err(err) = service.parse(request, CancellationToken::new()).await else {
            panic!("expected an error");
        };
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_text_file_streams_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.TXT");
        std::fs::write(&path, "A\n\nB\n\nC").unwrap();
        let service = service(dir.path(), None);

        let stream = service
            .parse(local(&path), CancellationToken::new())
            .await
            .unwrap();
        let messages = collect(stream).await;

        let contents: Vec<_> = messages.iter().map(|m| m.payload.clone()).collect();
        assert_eq!(
            contents,
            ["A", "B", "C"]
                .map(|c| Payload::Text {
                    content: c.to_string()
                })
                .to_vec()
        );
        assert!(messages.iter().all(|m| m.bbox_num == 3));
    }

    #[tokio::test]
    async fn test_pdf_writes_artifacts_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let service = service(dir.path(), None);

        let stream = service
            .parse(local(&path), CancellationToken::new())
            .await
            .unwrap();
        let messages = collect(stream).await;

        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].payload,
            Payload::Text {
                content: "alpha".to_string()
            }
        );
        let Payload::Artifact { locator, class } = &messages[1].payload else {
            panic!("expected an artifact");
        };
        assert_eq!(*class, crate::ingestion::ArtifactKind::Figure);
        assert!(locator.ends_with("page_1_figure_50_50.png"));
        assert!(Path::new(locator).is_file());
        assert_eq!(
            messages[1].page_info,
            PageInfo {
                width: 100,
                height: 100,
                page: 0,
                total: 1
            }
        );
    }

    fn minio(locator: &str) -> ParseRequest {
        ParseRequest {
            file_path: locator.to_string(),
            storage_type: StorageType::Minio,
            bucket: Some("docs".to_string()),
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_download_files_are_unique_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Some("docs"));
        let downloads = dir.path().join("downloads");

        let first = service.download_file("file/2023/report.pdf").await.unwrap();
        let second = service.download_file("file/2024/report.pdf").await.unwrap();

        assert_ne!(first.to_path_buf(), second.to_path_buf());
        for path in [&first, &second] {
            assert_eq!(path.parent(), Some(downloads.as_path()));
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
            assert!(path.is_file());
        }

        let removed = first.to_path_buf();
        drop(first);
        assert!(!removed.exists());
        assert_eq!(entries(&downloads), 1);
    }

    #[tokio::test]
    async fn test_remote_input_is_removed_after_streaming() {
        use httpmock::{Method::GET, MockServer};

        let server = MockServer::start_async().await;
        let object = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/file/notes.txt");
                then.status(200).body("A\n\nB");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(dir.path(), None, &server.base_url());
        let downloads = dir.path().join("downloads");

        let stream = service
            .parse(minio("file/notes.txt"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries(&downloads), 1);

        let messages = collect(stream).await;
        object.assert_async().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(entries(&downloads), 0);
    }

    #[tokio::test]
    async fn test_remote_input_is_removed_on_rejection() {
        use httpmock::{Method::GET, MockServer};

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/file/sheet.xlsx");
                then.status(200).body("x");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let service = service_at(dir.path(), None, &server.base_url());

        let Err(err) = service
            .parse(minio("file/sheet.xlsx"), CancellationToken::new())
            .await
        else {
            panic!("expected an error");
        };
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(entries(&dir.path().join("downloads")), 0);
    }
}
