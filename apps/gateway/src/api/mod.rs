//! Request-ingestion and polling routes, mounted under `/api`.

pub mod chat;
pub mod files;
pub mod stream;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/send", post(chat::send_handler))
        .route("/stream", get(stream::poll_handler))
        .route("/files/extract", post(files::extract_handler))
        .with_state(state)
}
