//! Maps the gateway's request-flow errors (validation, auth, rate-limiting,
//! missing resources) onto `axum_helpers::AppError`'s HTTP status mapping.

use crate::extract::ExtractError;
use crate::validation::ValidationError;
use axum_helpers::errors::AppError;

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::TooLarge => AppError::UnprocessableEntity(e.to_string()),
            ExtractError::DisallowedExtension(_) => AppError::BadRequest(e.to_string()),
            ExtractError::Unsupported(_) => AppError::UnprocessableEntity(e.to_string()),
            ExtractError::NotUtf8 => AppError::BadRequest(e.to_string()),
        }
    }
}

pub fn auth_error(message: impl Into<String>) -> AppError {
    AppError::Unauthorized(message.into())
}

pub fn conversation_not_found() -> AppError {
    AppError::NotFound("conversation not found".to_string())
}

pub fn rate_limited(class: &str) -> AppError {
    AppError::RateLimited(format!("rate limit exceeded for {class}"))
}

pub fn internal(message: impl Into<String>) -> AppError {
    AppError::InternalServerError(message.into())
}
