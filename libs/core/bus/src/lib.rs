//! The secondary bus: a JetStream-backed event stream carrying handler
//! lifecycle events (`llm.calls`, `file.processing`, `chatbot.events`) from
//! the orchestrator to the analytics consumer.
//!
//! This crate is deliberately payload-agnostic — it publishes and consumes
//! whatever `Serialize`/`Deserialize` type the caller hands it. The event
//! schema itself (`AnalyticsEvent` and friends) lives in `chatcore::analytics`,
//! which also owns the lazy singleton producer described as the event emitter.
//!
//! # Architecture
//!
//! ```text
//! chatcore handlers --publish--> EventPublisher --> JetStream stream --> BusSubscriber --> analytics-worker
//! ```

mod config;
mod error;
mod publisher;
mod subscriber;

pub use config::BusConfig;
pub use error::BusError;
pub use publisher::EventPublisher;
pub use subscriber::{BusMessage, BusSubscriber};
