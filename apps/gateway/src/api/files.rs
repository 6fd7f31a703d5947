//! `POST /files/extract`: synchronous, non-enqueued text extraction.

use crate::auth::authenticate;
use crate::error::{internal, rate_limited};
use crate::extract::{self, ExtractResult, MAX_UPLOAD_BYTES};
use crate::ip::resolve_client_ip;
use crate::state::AppState;
use axum::extract::{ConnectInfo, Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_helpers::errors::AppError;
use std::net::SocketAddr;

pub async fn extract_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResult>, AppError> {
    authenticate(&state, &headers).await?;

    let ip = resolve_client_ip(&headers, peer);
    let allowed = state
        .rate_limiter
        .check("file-upload", &ip, state.config.rate_limit.limit_for("file-upload"))
        .await
        .map_err(|e| internal(format!("rate limiter failed: {e}")))?;
    if !allowed {
        return Err(rate_limited("file-upload"));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
        .ok_or_else(|| AppError::BadRequest("no file field present".to_string()))?;

    let file_name = field.file_name().unwrap_or("upload").to_string();
    let extension = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    extract::validate_extension(&extension)?;

    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("failed to read upload body: {e}")))?;
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(AppError::UnprocessableEntity(format!(
            "file exceeds the {MAX_UPLOAD_BYTES} byte upload limit"
        )));
    }

    let result = extract::extract(&bytes, &extension)?;
    Ok(Json(result))
}
