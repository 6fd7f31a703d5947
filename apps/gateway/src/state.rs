//! Shared application state passed to every request handler.

use crate::conversation_store::ConversationStore;
use crate::rate_limit::RateLimiter;
use axum_helpers::JwtRedisAuth;
use job_queue::{JobProducer, ResultChannel};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<crate::config::GatewayConfig>,
    pub redis: redis::aio::ConnectionManager,
    pub conversations: ConversationStore,
    pub rate_limiter: RateLimiter,
    pub jwt_auth: JwtRedisAuth,
    pub producer: JobProducer,
    pub result_channel: ResultChannel,
}
