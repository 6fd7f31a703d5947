//! Liveness, readiness, and metrics endpoints for container orchestration.
//! Grounded on `job_queue::health`'s shape, trimmed to what a bus-only
//! consumer needs: there is no primary job stream or DLQ here to report on.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(health_handler))
        .route("/readyz", get(health_handler))
        .route("/metrics", get(observability::metrics_handler))
}
