use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;

mod api;
mod config;
mod error;
mod ingestion;
mod models;
mod service;
mod storage;
mod worker_pool;

use crate::ingestion::{ExtractionEngines, PdfiumRasterizer};
use crate::models::{HttpLayoutDetector, HttpTextRecognizer};
use crate::service::ParseService;
use crate::worker_pool::WorkerPool;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting docstream service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = config::load_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        dpi = config.pipeline.dpi,
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new().install_recorder()?;

    std::fs::create_dir_all(&config.storage.image_dir)?;
    std::fs::create_dir_all(&config.storage.download_dir)?;

    let pool = WorkerPool::new(config.pipeline.worker_threads);
    info!(workers = pool.size(), "Worker pool ready");
    let engines = ExtractionEngines {
        layout: Arc::new(HttpLayoutDetector::new(&config.models, pool.clone())?),
        ocr: Arc::new(HttpTextRecognizer::new(&config.models, pool.clone())?),
        rasterizer: Arc::new(PdfiumRasterizer::new(config.pipeline.max_page_pixels)),
        pool: pool.clone(),
    };
    info!(
        layout = %config.models.layout_url,
        ocr = %config.models.ocr_url,
        "Model adapters configured"
    );

    let s3 = storage::build_s3_client(&config.storage.object_store);
    let service = Arc::new(ParseService::new(
        engines,
        config.storage.clone(),
        s3,
        config.pipeline.dpi,
    ));

    let app = api::router(service, metrics);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docstream_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
