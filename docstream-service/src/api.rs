//! HTTP API for the docstream service.
//!
//! - `POST /parse` streams chunk messages as NDJSON
//! - `GET /health` and `GET /metrics` for monitoring

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Span, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{ErrorCode, ServiceError, format_error_chain};
use crate::service::{ChunkStream, ParseRequest, ParseService, StreamError};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Application state
pub struct AppState {
    pub service: Arc<ParseService>,
    pub metrics: PrometheusHandle,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<ParseService>, metrics: PrometheusHandle) -> Router {
    let state = Arc::new(AppState {
        service,
        metrics,
        start_time: Instant::now(),
    });

    Router::new()
        .route("/parse", post(parse_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Parse ===

async fn parse_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("parse", request_id = %request_id);
    let Json(request) = payload
        .map_err(|rejection| ServiceError::InvalidRequest {
            message: rejection.body_text(),
        })
        .inspect_err(|e| log_failure(&span, e, "Parse request rejected"))?;
    info!(parent: &span, file_path = %request.file_path, storage = %request.storage_type, "Parse request received");

    let cancel = CancellationToken::new();
    let messages = state
        .service
        .parse(request, cancel.clone())
        .instrument(span.clone())
        .await
        .inspect_err(|e| log_failure(&span, e, "Parse request rejected"))?;

    let lines = ndjson_lines(messages, cancel.drop_guard(), span);
    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response())
}

/// Serialize messages one per line. A failure ends the body with a single
/// error record. Dropping the body cancels the request through `guard`.
fn ndjson_lines(
    mut messages: ChunkStream,
    guard: DropGuard,
    span: Span,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let _guard = guard;
        let mut sent = 0usize;

        while let Some(message) = messages.next().await {
            let line = message.and_then(|m| {
                serde_json::to_vec(&m).map_err(|e| ServiceError::Internal {
                    message: format!("Failed to serialize chunk: {}", e),
                })
            });

            match line {
                Ok(mut line) => {
                    line.push(b'\n');
                    sent += 1;
                    metrics::counter!("docstream_chunks_emitted_total").increment(1);
                    yield Ok(Bytes::from(line));
                }
                Err(e) => {
                    metrics::counter!("docstream_stream_failures_total").increment(1);
                    error!(parent: &span, chunks_sent = sent, error = %format_error_chain(&e), "Parse failed mid-stream");
                    yield Ok(error_line(&e));
                    return;
                }
            }
        }

        info!(parent: &span, chunks_sent = sent, "Parse stream finished");
    }
}

fn error_line(error: &ServiceError) -> Bytes {
    let record = StreamError {
        error: error.to_error_response(),
    };
    let mut line = serde_json::to_vec(&record).unwrap_or_else(|_| {
        format!(
            r#"{{"error":{{"code":"{}","message":"stream failed"}}}}"#,
            record.error.code.as_str()
        )
        .into_bytes()
    });
    line.push(b'\n');
    Bytes::from(line)
}

fn log_failure(span: &Span, e: &ServiceError, message: &str) {
    let chain = format_error_chain(e);
    match e.code() {
        ErrorCode::Internal => error!(parent: span, code = e.code().as_str(), error = %chain, "{}", message),
        _ => warn!(parent: span, code = e.code().as_str(), error = %chain, "{}", message),
    }
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
