//! `GET /stream`: polls the result channel for a previously-enqueued job.

use crate::error::internal;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use axum_helpers::errors::AppError;
use job_queue::envelope::CorrelationId;
use job_queue::result_channel::ProgressRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub request_id: CorrelationId,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamResponse {
    Pending { status: &'static str },
    Record(ProgressRecord),
}

/// Reads the record for `request_id`; reports `{"status":"processing"}` if the job
/// hasn't written anything yet, and deletes the record once it has finished so a
/// repeated poll after completion sees the same "no record yet" shape.
pub async fn poll_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<StreamResponse>, AppError> {
    let record = state
        .result_channel
        .read(query.request_id)
        .await
        .map_err(|e| internal(format!("failed to read result channel: {e}")))?;

    let Some(record) = record else {
        return Ok(Json(StreamResponse::Pending { status: "processing" }));
    };

    if record.finished {
        state
            .result_channel
            .delete(query.request_id)
            .await
            .map_err(|e| internal(format!("failed to clear finished result: {e}")))?;
    }

    Ok(Json(StreamResponse::Record(record)))
}
