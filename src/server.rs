//! HTTP server for exposing Prometheus metrics.
//!
//! This module provides an Axum-based HTTP server that serves the `/metrics`
//! endpoint for Prometheus scraping and a `/health` endpoint for health checks.

use crate::client::ResourceResolver;
use crate::collector::Collector;
use crate::error::{ExporterError, Result};
use crate::metrics::{render, render_sample, Labels, Metric, MetricSample};
use crate::mounts::MountSource;
use crate::usage::UsageSource;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Value of the `Server` response header.
pub const SERVER_HEADER: &str = concat!("disk-usage-exporter/", env!("CARGO_PKG_VERSION"));

/// Shared application state.
struct AppState<M, U, R> {
    collector: Arc<Collector<M, U, R>>,
}

impl<M, U, R> Clone for AppState<M, U, R> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
        }
    }
}

/// Build the exporter's router.
pub fn router<M, U, R>(collector: Collector<M, U, R>) -> Router
where
    M: MountSource,
    U: UsageSource,
    R: ResourceResolver,
{
    let state = AppState {
        collector: Arc::new(collector),
    };

    Router::new()
        .route("/metrics", get(metrics_handler::<M, U, R>))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the exporter on an already bound listener.
pub async fn serve<M, U, R>(listener: TcpListener, collector: Collector<M, U, R>) -> Result<()>
where
    M: MountSource,
    U: UsageSource,
    R: ResourceResolver,
{
    axum::serve(listener, router(collector))
        .await
        .map_err(|e| ExporterError::Server(e.to_string()))
}

/// Start the HTTP server.
///
/// # Arguments
///
/// * `listen_address` - Address to bind to (e.g., "0.0.0.0:9274")
/// * `collector` - Metrics collector instance
pub async fn start_server<M, U, R>(listen_address: &str, collector: Collector<M, U, R>) -> Result<()>
where
    M: MountSource,
    U: UsageSource,
    R: ResourceResolver,
{
    info!("Starting HTTP server on {}", listen_address);

    let listener = TcpListener::bind(listen_address).await?;
    serve(listener, collector).await
}

/// Handler for /metrics endpoint.
async fn metrics_handler<M, U, R>(State(state): State<AppState<M, U, R>>) -> Response
where
    M: MountSource,
    U: UsageSource,
    R: ResourceResolver,
{
    let started = Instant::now();
    info!("Received metrics scrape request");

    let per_mount = match state.collector.collect().await {
        Ok(per_mount) => per_mount,
        Err(e) => {
            warn!("Failed to collect metrics: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::SERVER, SERVER_HEADER)],
                format!("Failed to collect metrics: {}", e),
            )
                .into_response();
        }
    };
    let collect_seconds = started.elapsed().as_secs_f64();

    let mut samples: Vec<MetricSample> = per_mount.into_iter().flatten().collect();
    samples.push(MetricSample::new(
        Metric::CollectSeconds,
        collect_seconds,
        Labels::new(),
    ));

    // request_seconds is the last family, so its sample closes the body
    let mut body = render(&samples);
    body.push_str(&render_sample(&MetricSample::new(
        Metric::RequestSeconds,
        started.elapsed().as_secs_f64(),
        Labels::new(),
    )));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, prometheus::TEXT_FORMAT),
            (header::SERVER, SERVER_HEADER),
        ],
        body,
    )
        .into_response()
}

/// Handler for /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for root endpoint.
async fn root_handler() -> Response {
    let html = r#"
<!DOCTYPE html>
<html>
<head>
    <title>PV Disk Usage Exporter</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        a { color: #0066cc; text-decoration: none; }
    </style>
</head>
<body>
    <h1>PV Disk Usage Exporter</h1>
    <p>Disk usage of Kubernetes PersistentVolume mounts on this node.</p>
    <ul>
        <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
        <li><a href="/health">/health</a> - Health check</li>
    </ul>
</body>
</html>
"#;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}
