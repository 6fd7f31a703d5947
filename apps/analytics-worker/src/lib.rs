//! Analytics Consumer: a separate consumer group on the secondary bus that
//! transforms, persists, and aggregates handler lifecycle events.
//!
//! ## Architecture
//!
//! ```text
//! secondary bus (llm.calls / file.processing / chatbot.events)
//!   -> AnalyticsConsumer::run
//!        -> transform (user_id_hash, time bucket, service/environment)
//!        -> AnalyticsStore::persist_event   (analytics_events)
//!        -> AnalyticsStore::increment/push  (analytics_metrics)
//!        -> statistics pass                 (latency_stats)
//!        -> AnalyticsStore::*_time_series*  (time_series)
//! ```

mod config;
mod consumer;
mod health;
mod store;
mod transform;

use axum::serve;
use config::AnalyticsConfig;
use consumer::AnalyticsConsumer;
use core_config::FromEnv;
use database::redis::connect_from_config_with_retry;
use eyre::{Result, WrapErr};
use std::sync::Arc;
use store::AnalyticsStore;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const APP_NAME: &str = "analytics-worker";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run() -> Result<()> {
    color_eyre::install().ok();

    let config = AnalyticsConfig::from_env().wrap_err("failed to load analytics-worker configuration")?;
    core_config::tracing::init_tracing(&config.environment);
    observability::init_metrics();
    info!(name = APP_NAME, version = APP_VERSION, "starting analytics worker");

    info!("connecting to redis...");
    let redis = connect_from_config_with_retry(config.redis.clone(), None)
        .await
        .wrap_err("failed to connect to redis")?;
    info!("connected to redis");

    let store = AnalyticsStore::new(redis);

    info!(nats_url = %config.bus.nats_url, stream = %config.bus.stream_name, "connecting to secondary bus...");
    let consumer = Arc::new(
        AnalyticsConsumer::connect(
            config.bus.clone(),
            store,
            config.window_minutes,
            APP_NAME,
            if config.environment.is_production() { "production" } else { "development" },
        )
        .await
        .wrap_err("failed to connect to secondary bus")?,
    );
    info!("connected to secondary bus");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    let health_port = config.health.port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    consumer.run(shutdown_rx).await.wrap_err("analytics consumer failed")?;

    info!("analytics worker stopped");
    Ok(())
}

async fn start_health_server(port: u16) -> Result<()> {
    let app = health::router();
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind health server to {addr}"))?;
    info!(%port, "health server listening");
    serve(listener, app).await.wrap_err("health server failed")?;
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, initiating shutdown..."),
        _ = terminate => info!("received sigterm, initiating shutdown..."),
    }

    Ok(())
}
