//! Ingestion Gateway: the authenticated HTTP surface in front of the job
//! stream.
//!
//! ## Architecture
//!
//! ```text
//! POST /api/chat/send
//!   -> authenticate -> resolve ip -> rate-limit -> validate -> persist
//!   -> enqueue JobEnvelope::Chat on the primary stream
//!   -> {correlation_id, conversation_id}
//!
//! GET /api/stream?request_id=...
//!   -> poll job_queue::ResultChannel
//!
//! POST /api/files/extract
//!   -> synchronous text extraction, never touches the job stream
//!
//! /admin/dlq/*, /health, /ready
//!   -> job_queue::health's admin surface, reused as-is
//! ```

mod api;
mod auth;
mod config;
mod conversation_store;
mod error;
mod extract;
mod ip;
mod openapi;
mod rate_limit;
mod state;
mod validation;

use axum::{middleware, routing::get, Router};
use axum_helpers::server::create_production_app;
use config::GatewayConfig;
use core_config::tracing::init_tracing;
use database::redis::connect_from_config_with_retry;
use eyre::{Result, WrapErr};
use job_queue::{dlq_admin_router, ready_handler, stream_info_handler, HealthState, JobProducer, ResultChannel};
use state::AppState;
use std::time::Duration;
use tracing::info;

const APP_NAME: &str = "gateway";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run() -> Result<()> {
    color_eyre::install().ok();

    let config = GatewayConfig::from_env().wrap_err("failed to load gateway configuration")?;
    init_tracing(&config.environment);
    observability::init_metrics();
    info!(name = APP_NAME, version = APP_VERSION, "starting gateway");

    info!("connecting to redis...");
    let redis = connect_from_config_with_retry(config.redis.clone(), None)
        .await
        .wrap_err("failed to connect to redis")?;
    info!("connected to redis");

    let jwt_auth = axum_helpers::JwtRedisAuth::new(redis.clone(), config.jwt_secret.as_deref())
        .wrap_err("failed to initialize jwt auth")?;

    let state = AppState {
        config: std::sync::Arc::new(config.clone()),
        redis: redis.clone(),
        conversations: conversation_store::ConversationStore::new(redis.clone()),
        rate_limiter: rate_limit::RateLimiter::new(redis.clone()),
        jwt_auth,
        producer: JobProducer::new(redis.clone(), config.jobs_stream.clone()),
        result_channel: ResultChannel::new(redis.clone()),
    };

    let api_routes = api::router(state.clone());
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    let health_state = HealthState::new(
        redis.clone(),
        APP_NAME.to_string(),
        APP_VERSION.to_string(),
        config.jobs_stream.clone(),
    );
    let metrics_router = Router::new().route("/metrics", get(observability::metrics_handler));
    // `create_router` already registers `/health`; only add the readiness/stream
    // probes and the dead-letter admin surface job_queue already implements.
    let readiness_router = Router::new()
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/stream/info", get(stream_info_handler))
        .with_state(health_state.clone());

    let app = router
        .layer(middleware::from_fn(observability::middleware::metrics_middleware))
        .merge(readiness_router)
        .merge(dlq_admin_router(health_state))
        .merge(metrics_router);

    info!("starting gateway with production-ready shutdown (30s timeout)");
    create_production_app(
        app,
        &config.server,
        Duration::from_secs(30),
        async move {
            drop(state.redis);
            info!("redis connection closed");
        },
    )
    .await
    .wrap_err("server error")?;

    info!("gateway shutdown complete");
    Ok(())
}
