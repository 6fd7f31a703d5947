//! Orchestrator: the worker pool that drains the primary job stream and
//! dispatches each `JobEnvelope` to the chat/file/kb handler that owns its
//! topic.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (jobs:stream)
//!   ↓ (consumer group)
//! WorkerPool<DispatchHandler>
//!   ↓
//! ChatHandler / FileHandler / KbHandler
//!   ↓
//! LlmProvider / EmbeddingModel / VectorStore / DocumentStore (collaborators/)
//! ```

mod collaborators;
mod config;
mod dispatch;

use chatcore::{ChatHandler, FileHandler, KbHandler};
use collaborators::{LlmHttpClient, PlainTextExtractor, QdrantVectorStore, RedisDocumentStore};
use config::OrchestratorConfig;
use core_config::{Environment, FromEnv};
use database::redis::{connect_from_config_with_retry, RedisConfig};
use dispatch::DispatchHandler;
use eyre::{Result, WrapErr};
use job_queue::{full_admin_router, HealthState, RetryPolicy, WorkerConfig, WorkerPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const APP_NAME: &str = "orchestrator";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start_health_server(state: HealthState, port: u16) -> Result<()> {
    let app = full_admin_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind health server to {addr}"))?;

    info!(%port, "health and admin server listening");
    axum::serve(listener, app).await.wrap_err("health server failed")?;
    Ok(())
}

/// Run the orchestrator: connect to Redis and Qdrant, wire the three job
/// handlers behind a single dispatching `JobHandler`, and drain the primary
/// stream until shutdown.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    observability::init_metrics();

    info!(name = APP_NAME, version = APP_VERSION, "starting orchestrator");

    let config = OrchestratorConfig::from_env().wrap_err("failed to load orchestrator configuration")?;

    info!("connecting to redis...");
    let redis_config = RedisConfig::new(config.redis_url.clone());
    let redis = connect_from_config_with_retry(redis_config, None)
        .await
        .wrap_err("failed to connect to redis")?;
    info!("connected to redis");

    info!("connecting to qdrant...");
    let qdrant = qdrant_client::Qdrant::from_url(&config.qdrant_url)
        .build()
        .wrap_err("failed to build qdrant client")?;
    let vectors: Arc<dyn chatcore::VectorStore> =
        Arc::new(QdrantVectorStore::new(qdrant, config.qdrant_vector_size));

    let llm = Arc::new(LlmHttpClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));
    let embeddings = Arc::new(LlmHttpClient::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.embedding_model.clone(),
    ));
    let documents: Arc<dyn chatcore::DocumentStore> = Arc::new(RedisDocumentStore::new(redis.clone()));
    let extractor: Arc<dyn chatcore::TextExtractor> = Arc::new(PlainTextExtractor);

    let chat_handler = Arc::new(ChatHandler::new(
        llm.clone(),
        embeddings.clone(),
        vectors.clone(),
        documents.clone(),
        job_queue::ResultChannel::new(redis.clone()),
    ));
    let file_handler = Arc::new(FileHandler::new(
        extractor.clone(),
        embeddings.clone(),
        vectors.clone(),
        documents.clone(),
    ));
    let kb_handler = Arc::new(KbHandler::new(extractor, embeddings, vectors, documents));

    let dispatcher = Arc::new(DispatchHandler::new(chat_handler, file_handler, kb_handler));

    let worker_config = WorkerConfig::default().with_max_concurrent_jobs(config.max_concurrent_jobs);
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        max_concurrent_jobs = %worker_config.max_concurrent_jobs,
        "worker configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(
        redis.clone(),
        APP_NAME.to_string(),
        APP_VERSION.to_string(),
        worker_config.stream_name.clone(),
    );
    let health_state_clone = health_state.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state_clone, health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    info!("starting worker pool...");
    let pool = WorkerPool::new(redis, dispatcher, worker_config, RetryPolicy::default());
    pool.run(shutdown_rx).await.wrap_err("worker pool failed")?;

    info!("orchestrator stopped");
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
