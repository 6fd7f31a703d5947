//! Error types for the secondary bus.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),

    #[error("failed to create or bind stream: {0}")]
    Stream(String),

    #[error("failed to create consumer: {0}")]
    Consumer(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("ack failed: {0}")]
    Ack(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
