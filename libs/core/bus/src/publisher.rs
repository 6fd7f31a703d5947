//! Publishes events onto the secondary bus's JetStream stream.

use crate::config::BusConfig;
use crate::error::BusError;
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use serde::Serialize;
use tracing::debug;

/// Thin, cheaply-cloneable handle used to publish events onto the secondary bus.
///
/// `chatcore`'s event emitter wraps this behind a lazily-initialized singleton;
/// this type itself holds no process-wide state beyond the underlying NATS
/// client handle, which is safe to clone and share across tasks.
#[derive(Clone)]
pub struct EventPublisher {
    jetstream: jetstream::Context,
}

impl EventPublisher {
    /// Connect to NATS and ensure the secondary bus stream exists, capturing
    /// all configured subjects.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client = async_nats::connect(&config.nats_url).await?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(StreamConfig {
                name: config.stream_name.clone(),
                subjects: config.subjects(),
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Stream(e.to_string()))?;

        Ok(Self { jetstream })
    }

    /// Publish an event to `subject`, waiting for the broker to persist it.
    ///
    /// Callers that want true fire-and-forget semantics should spawn this
    /// rather than await it inline in a handler's hot path.
    pub async fn publish<T: Serialize>(&self, subject: &str, event: &T) -> Result<(), BusError> {
        let payload = serde_json::to_vec(event)?;
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;
        ack.await.map_err(|e| BusError::Publish(e.to_string()))?;
        debug!(subject, "published event to secondary bus");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn serializes_before_publishing() {
        let sample = Sample { value: 42 };
        let bytes = serde_json::to_vec(&sample).unwrap();
        let roundtrip: Sample = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(roundtrip.value, 42);
    }
}
