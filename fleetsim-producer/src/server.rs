// Fleetsim Producer - Telemetry publisher for simulated sensor fleets
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP endpoints for metrics scraping and status checks.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics::encode_metrics;
use crate::runner::ProducerState;

/// State shared across handlers.
pub struct AppState {
    producer: Arc<ProducerState>,
    topic: String,
    format: &'static str,
    schema_id: Option<u32>,
    sensor_count: usize,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        producer: Arc<ProducerState>,
        topic: impl Into<String>,
        format: &'static str,
        schema_id: Option<u32>,
        sensor_count: usize,
    ) -> Self {
        Self {
            producer,
            topic: topic.into(),
            format,
            schema_id,
            sensor_count,
            start_time: Instant::now(),
        }
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Serve the endpoints on `0.0.0.0:port` until the task is dropped.
pub async fn serve(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);
    axum::serve(listener, router(state)).await
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    version: String,
    uptime_secs: u64,
    running: bool,
    topic: String,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_id: Option<u32>,
    sensor_count: usize,
    sensors_seen: usize,
    ticks: u64,
    published: u64,
    duplicates: u64,
    errors: u64,
    active_anomalies: usize,
}

fn status(state: &AppState) -> StatusResponse {
    let producer = &state.producer;
    StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        running: producer.running.load(Ordering::SeqCst),
        topic: state.topic.clone(),
        format: state.format,
        schema_id: state.schema_id,
        sensor_count: state.sensor_count,
        sensors_seen: producer.sensors_seen.load(Ordering::SeqCst),
        ticks: producer.ticks(),
        published: producer.published(),
        duplicates: producer.duplicates(),
        errors: producer.errors(),
        active_anomalies: producer.active_anomalies.load(Ordering::SeqCst),
    }
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status(&state))
}
