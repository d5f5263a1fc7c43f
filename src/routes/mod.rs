//! HTTP route handlers for the exporter.
//!
//! - `health`: liveness, readiness and version endpoints
//! - `metrics`: Prometheus text exposition of the current snapshot
//! - `snapshot`: JSON view of the current snapshot

pub mod health;
pub mod metrics;
pub mod snapshot;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::state::AppState;

/// Builds the full router with tracing and compression layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/version", get(health::version))
        .route("/metrics", get(metrics::metrics_prometheus))
        .route("/snapshot", get(snapshot::get_snapshot))
        .fallback(not_found)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CompressionLayer::new()))
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
