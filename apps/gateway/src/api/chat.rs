//! `POST /chat/send`: the authenticated request-ingestion flow.

use crate::auth::authenticate;
use crate::error::{conversation_not_found, internal, rate_limited};
use crate::ip::resolve_client_ip;
use crate::state::AppState;
use crate::validation::validate_message;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_helpers::errors::AppError;
use job_queue::envelope::{ChatPayload, CorrelationId, JobEnvelope};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

const DISPLAY_PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    pub conversation_id: Option<Uuid>,
    pub message: String,
    #[serde(default)]
    pub generate_title: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatSendResponse {
    pub correlation_id: Uuid,
    pub conversation_id: Uuid,
}

pub async fn send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<ChatSendRequest>,
) -> Result<Json<ChatSendResponse>, AppError> {
    let user_id = authenticate(&state, &headers).await?;

    let ip = resolve_client_ip(&headers, peer);
    let allowed = state
        .rate_limiter
        .check("chat", &ip, state.config.rate_limit.limit_for("chat"))
        .await
        .map_err(|e| internal(format!("rate limiter failed: {e}")))?;
    if !allowed {
        return Err(rate_limited("chat"));
    }

    validate_message(&request.message, state.config.max_message_chars)?;

    let conversation = if request.conversation_id.is_some() {
        state
            .conversations
            .find_owned(request.conversation_id.unwrap(), user_id)
            .await
            .map_err(|e| internal(format!("failed to look up conversation: {e}")))?
            .ok_or_else(conversation_not_found)?
    } else {
        state
            .conversations
            .resolve_or_create(None, user_id)
            .await
            .map_err(|e| internal(format!("failed to create conversation: {e}")))?
    };

    let display_text: String = request.message.chars().take(DISPLAY_PREVIEW_CHARS).collect();
    state
        .conversations
        .append_user_message(conversation.id, &display_text)
        .await
        .map_err(|e| internal(format!("failed to persist message: {e}")))?;
    state
        .conversations
        .record_ip_message(&ip, user_id, conversation.id)
        .await
        .map_err(|e| internal(format!("failed to record ip message: {e}")))?;

    let correlation_id = CorrelationId::new();
    let envelope = JobEnvelope::Chat {
        correlation_id,
        payload: ChatPayload {
            conversation_id: conversation.id,
            user_id,
            message: request.message,
            generate_title: request.generate_title,
        },
        retry_meta: None,
    };
    state
        .producer
        .send(&envelope)
        .await
        .map_err(|e| internal(format!("failed to enqueue job: {e}")))?;

    Ok(Json(ChatSendResponse { correlation_id: correlation_id.0, conversation_id: conversation.id }))
}
