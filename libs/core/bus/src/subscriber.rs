//! Durable pull-consumer subscription used by the analytics consumer (C8).

use crate::config::BusConfig;
use crate::error::BusError;
use async_nats::jetstream::{self, consumer::pull, stream::Config as StreamConfig, AckKind};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// A durable consumer group on the secondary bus stream.
///
/// Binds (or creates) a single JetStream pull consumer filtered to the bus's
/// three subjects, so every process running with the same `consumer_durable_name`
/// shares one logical consumer group — a separate consumer group on the
/// secondary bus, dedicated to the analytics service.
pub struct BusSubscriber {
    consumer: jetstream::consumer::Consumer<pull::Config>,
}

impl BusSubscriber {
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client = async_nats::connect(&config.nats_url).await?;
        let jetstream = jetstream::new(client);

        let stream = jetstream
            .get_or_create_stream(StreamConfig {
                name: config.stream_name.clone(),
                subjects: config.subjects(),
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Stream(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                &config.consumer_durable_name,
                pull::Config {
                    durable_name: Some(config.consumer_durable_name.clone()),
                    filter_subjects: config.subjects(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(config.ack_wait_secs),
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::Consumer(e.to_string()))?;

        Ok(Self { consumer })
    }

    /// Fetch up to `batch_size` messages, waiting at most `expires` for the
    /// first one to arrive. Returns an empty batch on timeout rather than erroring.
    pub async fn next_batch(
        &self,
        batch_size: usize,
        expires: Duration,
    ) -> Result<Vec<BusMessage>, BusError> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(batch_size)
            .expires(expires)
            .messages()
            .await
            .map_err(|e| BusError::Fetch(e.to_string()))?;

        let mut batch = Vec::with_capacity(batch_size);
        while let Some(next) = messages.next().await {
            match next {
                Ok(message) => batch.push(BusMessage { inner: message }),
                Err(e) => warn!(error = %e, "error pulling message from secondary bus"),
            }
        }
        debug!(count = batch.len(), "fetched batch from secondary bus");
        Ok(batch)
    }
}

/// One delivered message, still unacked.
pub struct BusMessage {
    inner: jetstream::Message,
}

impl BusMessage {
    pub fn subject(&self) -> &str {
        self.inner.subject.as_str()
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        Ok(serde_json::from_slice(&self.inner.payload)?)
    }

    pub async fn ack(&self) -> Result<(), BusError> {
        self.inner
            .ack()
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }

    /// Nak so the broker redelivers (subject to `max_deliver`), used when a
    /// single event fails processing and the consumer should move on without
    /// losing it outright.
    pub async fn nak(&self) -> Result<(), BusError> {
        self.inner
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}
