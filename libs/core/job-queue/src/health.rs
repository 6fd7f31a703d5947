//! Liveness/readiness probes, stream monitoring, and dead-letter admin endpoints,
//! reused by the orchestrator worker and (read-only parts) the gateway.

use crate::dlq::{DlqStatus, DlqStore};
use crate::envelope::JobEnvelope;
use crate::producer::JobProducer;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use observability::JobMetrics;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct HealthState {
    pub redis: Arc<ConnectionManager>,
    pub app_name: String,
    pub app_version: String,
    pub stream_name: String,
    pub dlq: DlqStore,
    pub producer: JobProducer,
}

impl HealthState {
    pub fn new(
        redis: ConnectionManager,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        let stream_name = stream_name.into();
        Self {
            redis: Arc::new(redis.clone()),
            app_name: app_name.into(),
            app_version: app_version.into(),
            dlq: DlqStore::new(redis.clone()),
            producer: JobProducer::new(redis, stream_name.clone()),
            stream_name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub version: String,
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
    })
}

pub async fn ready_handler(
    State(state): State<HealthState>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut conn = (*state.redis).clone();
    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;

    match result {
        Ok(response) if response == "PONG" => {
            Ok((StatusCode::OK, Json(json!({"status": "ready", "checks": {"redis": "ok"}}))))
        }
        Ok(response) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "checks": {"redis": format!("unexpected response: {response}")}})),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not_ready", "checks": {"redis": format!("error: {e}")}})),
        )),
    }
}

pub async fn stream_info_handler(
    State(state): State<HealthState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut conn = (*state.redis).clone();
    let result: Result<redis::streams::StreamInfoStreamReply, _> = redis::cmd("XINFO")
        .arg("STREAM")
        .arg(&state.stream_name)
        .query_async(&mut conn)
        .await;

    match result {
        Ok(info) => Ok(Json(json!({
            "stream": state.stream_name,
            "length": info.length,
            "first_entry_id": info.first_entry.id,
            "last_entry_id": info.last_entry.id,
            "groups": info.groups,
        }))),
        Err(e) => {
            let err_str = e.to_string();
            if err_str.contains("no such key") {
                Ok(Json(json!({"stream": state.stream_name, "length": 0, "message": "stream does not exist yet"})))
            } else {
                Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err_str}))))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DlqListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub status: Option<DlqStatus>,
}

fn default_limit() -> usize {
    20
}

pub async fn dlq_stats_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.dlq.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

pub async fn dlq_list_handler(
    State(state): State<HealthState>,
    Query(params): Query<DlqListParams>,
) -> impl IntoResponse {
    let limit = params.limit.min(100);
    match state.dlq.list(params.status, limit, params.offset).await {
        Ok(records) => Json(json!({"records": records, "limit": limit, "offset": params.offset})).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

pub async fn dlq_get_handler(State(state): State<HealthState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.dlq.get(id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({"error": "dlq record not found"}))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

/// Re-enqueue a dead-lettered job onto the primary stream and mark it retried.
pub async fn dlq_retry_handler(State(state): State<HealthState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    let record = match state.dlq.get(id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, Json(json!({"error": "dlq record not found"}))).into_response()
        }
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    };

    let envelope: JobEnvelope = match serde_json::from_str(&record.message_data) {
        Ok(envelope) => envelope,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": format!("stored job is not a valid envelope: {e}")})),
            )
                .into_response()
        }
    };

    if let Err(e) = state.producer.send(&envelope).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response();
    }
    JobMetrics::record_dispatched(envelope.original_topic());

    match state.dlq.mark_retried(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

pub async fn dlq_resolve_handler(State(state): State<HealthState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.dlq.mark_resolved(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

pub async fn dlq_delete_handler(State(state): State<HealthState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.dlq.delete(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, Json(json!({"error": "dlq record not found"}))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response(),
    }
}

/// Re-enqueue every pending dead-lettered job, e.g. after a downstream outage clears.
pub async fn dlq_retry_all_pending_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let pending = match state.dlq.list(Some(DlqStatus::Pending), 1000, 0).await {
        Ok(records) => records,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": e.to_string()}))).into_response()
        }
    };

    let mut retried = 0usize;
    for record in pending {
        let Ok(envelope) = serde_json::from_str::<JobEnvelope>(&record.message_data) else {
            continue;
        };
        if state.producer.send(&envelope).await.is_ok() && state.dlq.mark_retried(record.id).await.is_ok() {
            retried += 1;
        }
    }

    Json(json!({"retried": retried})).into_response()
}

pub fn health_router(state: HealthState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/stream/info", get(stream_info_handler))
        .with_state(state)
}

pub fn dlq_admin_router(state: HealthState) -> axum::Router {
    use axum::routing::{delete, get, post};

    axum::Router::new()
        .route("/admin/dlq/stats", get(dlq_stats_handler))
        .route("/admin/dlq", get(dlq_list_handler))
        .route("/admin/dlq/retry-all-pending", post(dlq_retry_all_pending_handler))
        .route("/admin/dlq/{id}", get(dlq_get_handler))
        .route("/admin/dlq/{id}/retry", post(dlq_retry_handler))
        .route("/admin/dlq/{id}/resolve", post(dlq_resolve_handler))
        .route("/admin/dlq/{id}", delete(dlq_delete_handler))
        .with_state(state)
}

pub fn full_admin_router(state: HealthState) -> axum::Router {
    health_router(state.clone()).merge(dlq_admin_router(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes_status_healthy() {
        let response = HealthResponse {
            status: "healthy",
            name: "orchestrator".to_string(),
            version: "1.0.0".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
    }

    #[test]
    fn default_limit_is_twenty() {
        assert_eq!(default_limit(), 20);
    }
}
