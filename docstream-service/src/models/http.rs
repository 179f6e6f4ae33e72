//! HTTP adapters for layout and OCR inference servers.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbImage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelsConfig;
use crate::error::{ModelError, ServiceError, ServiceResult};
use crate::worker_pool::WorkerPool;

use super::{Detection, LayoutDetector, LayoutResult, RecognizedLine, TextRecognizer};

/// Shared request plumbing for both adapters.
struct InferenceClient {
    client: Client,
    pool: WorkerPool,
}

impl InferenceClient {
    fn new(config: &ModelsConfig, base_url: &str, pool: WorkerPool) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ServiceError::Model(ModelError::Connection {
                    url: base_url.to_string(),
                    source: e,
                })
            })?;

        Ok(Self { client, pool })
    }

    /// PNG-encode and base64 the image on the worker pool.
    async fn encode(&self, image: Arc<RgbImage>) -> Result<String, ModelError> {
        self.pool
            .run(move || encode_png_base64(&image))
            .await
            .map_err(ModelError::EncodeTask)?
    }

    async fn post<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, ModelError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Connection {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Inference {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse {
                url: url.to_string(),
                source: e,
            })
    }
}

pub(crate) fn encode_png_base64(image: &RgbImage) -> Result<String, ModelError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ModelError::Encode)?;
    Ok(BASE64.encode(buffer.into_inner()))
}

// ==================== Layout ====================

/// Layout detector served at `{layout_url}/detect`.
pub struct HttpLayoutDetector {
    inner: InferenceClient,
    url: String,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: String,
    ignore_category_ids: &'a [u32],
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    layout_dets: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    poly: [f32; 8],
    category_id: u32,
    #[serde(default)]
    score: f32,
}

impl HttpLayoutDetector {
    pub fn new(config: &ModelsConfig, pool: WorkerPool) -> ServiceResult<Self> {
        let base_url = config.layout_url.trim_end_matches('/');
        Ok(Self {
            inner: InferenceClient::new(config, base_url, pool)?,
            url: format!("{}/detect", base_url),
        })
    }
}

#[async_trait]
impl LayoutDetector for HttpLayoutDetector {
    async fn detect(
        &self,
        image: Arc<RgbImage>,
        ignored_category_ids: &[u32],
    ) -> Result<LayoutResult, ModelError> {
        let (width, height) = image.dimensions();
        let encoded = self.inner.encode(image).await?;
        let response: DetectResponse = self
            .inner
            .post(
                &self.url,
                &DetectRequest {
                    image: encoded,
                    ignore_category_ids: ignored_category_ids,
                },
            )
            .await?;

        debug!(
            width,
            height,
            detections = response.layout_dets.len(),
            "Layout detection complete"
        );

        Ok(LayoutResult {
            detections: response
                .layout_dets
                .into_iter()
                .map(|d| Detection {
                    polygon: d.poly,
                    category_id: d.category_id,
                    score: d.score,
                })
                .collect(),
        })
    }
}

// ==================== OCR ====================

/// OCR engine served at `{ocr_url}/recognize`.
pub struct HttpTextRecognizer {
    inner: InferenceClient,
    url: String,
}

#[derive(Serialize)]
struct RecognizeRequest {
    image: String,
}

/// `[polygon, [text, confidence]]`
type RawLine = (Vec<[f32; 2]>, (String, f32));

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Option<Vec<RawLine>>,
}

impl RecognizeResponse {
    fn into_lines(self) -> Vec<RecognizedLine> {
        self.results
            .unwrap_or_default()
            .into_iter()
            .map(|(polygon, (text, confidence))| RecognizedLine {
                polygon,
                text,
                confidence,
            })
            .collect()
    }
}

impl HttpTextRecognizer {
    pub fn new(config: &ModelsConfig, pool: WorkerPool) -> ServiceResult<Self> {
        let base_url = config.ocr_url.trim_end_matches('/');
        Ok(Self {
            inner: InferenceClient::new(config, base_url, pool)?,
            url: format!("{}/recognize", base_url),
        })
    }
}

#[async_trait]
impl TextRecognizer for HttpTextRecognizer {
    async fn recognize(&self, image: Arc<RgbImage>) -> Result<Vec<RecognizedLine>, ModelError> {
        let encoded = self.inner.encode(image).await?;
        let response: RecognizeResponse = self
            .inner
            .post(&self.url, &RecognizeRequest { image: encoded })
            .await?;
        Ok(response.into_lines())
    }
}
