//! Bearer-token identity verification against the JWT + Redis collaborator.
//! Stands in for an `IdentityVerifier` external collaborator.

use crate::error::auth_error;
use crate::state::AppState;
use axum::http::HeaderMap;
use axum_helpers::errors::AppError;
use uuid::Uuid;

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| auth_error("missing bearer token"))?;

    let claims = state
        .jwt_auth
        .verify_token(token)
        .map_err(|e| auth_error(format!("invalid token: {e}")))?;

    if state
        .jwt_auth
        .is_token_blacklisted(&claims.jti)
        .await
        .map_err(|e| auth_error(format!("failed to check token revocation: {e}")))?
    {
        return Err(auth_error("token has been revoked"));
    }

    Uuid::parse_str(&claims.sub).map_err(|_| auth_error("token subject is not a valid user id"))
}
