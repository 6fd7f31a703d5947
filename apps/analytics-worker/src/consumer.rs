//! The subscribe/transform/persist/aggregate loop: one durable consumer group
//! on the secondary bus, fanning out by subject to the LLM, FILE, and generic
//! lifecycle-event aggregation paths.

use crate::store::AnalyticsStore;
use crate::transform;
use bus::{BusConfig, BusMessage, BusSubscriber};
use chatcore::analytics::{compute_latency_stats, ConversationEvent, FileProcessedEvent, LlmResponseEvent};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct AnalyticsConsumer {
    subscriber: BusSubscriber,
    store: AnalyticsStore,
    bus_config: BusConfig,
    window_minutes: i64,
    service: String,
    environment: String,
}

impl AnalyticsConsumer {
    pub async fn connect(
        bus_config: BusConfig,
        store: AnalyticsStore,
        window_minutes: i64,
        service: impl Into<String>,
        environment: impl Into<String>,
    ) -> eyre::Result<Self> {
        let subscriber = BusSubscriber::connect(&bus_config).await?;
        Ok(Self {
            subscriber,
            store,
            bus_config,
            window_minutes,
            service: service.into(),
            environment: environment.into(),
        })
    }

    /// Drain the secondary bus until `shutdown` fires, acking or nak-ing each
    /// message after it's processed. A single event's transform/persist/aggregate
    /// failure is logged and recorded as a `PROCESSING_ERROR`; it never stops
    /// the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> eyre::Result<()> {
        info!(
            stream = %self.bus_config.stream_name,
            consumer = %self.bus_config.consumer_durable_name,
            "analytics consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                batch = self.subscriber.next_batch(self.bus_config.batch_size, Duration::from_secs(5)) => batch?,
                _ = shutdown.changed() => continue,
            };

            for message in &batch {
                self.handle_message(message).await;
            }
        }

        info!("analytics consumer shutting down");
        Ok(())
    }

    async fn handle_message(&self, message: &BusMessage) {
        let subject = message.subject().to_string();
        let outcome = match subject.as_str() {
            s if s == self.bus_config.llm_calls_subject => self.handle_llm(message).await,
            s if s == self.bus_config.file_processing_subject => self.handle_file(message).await,
            s if s == self.bus_config.chatbot_events_subject => self.handle_conversation(message).await,
            other => {
                warn!(subject = other, "unrecognized subject on secondary bus, acking and dropping");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = message.ack().await {
                    error!(error = %e, subject, "failed to ack secondary bus message");
                }
            }
            Err(e) => {
                error!(error = %e, subject, "failed to process analytics event");
                let record = transform::processing_error_event(&subject, &e.to_string(), &self.service, &self.environment);
                if let Err(persist_err) = self.store.persist_event(&record).await {
                    error!(error = %persist_err, "failed to persist PROCESSING_ERROR event");
                }
                if let Err(nak_err) = message.nak().await {
                    error!(error = %nak_err, subject, "failed to nak secondary bus message");
                }
            }
        }
    }

    async fn handle_llm(&self, message: &BusMessage) -> eyre::Result<()> {
        let event: LlmResponseEvent = message.deserialize()?;
        let record = transform::transform_llm(&event, &self.service, &self.environment);
        self.store.persist_event(&record).await?;

        let bucket = transform::floor_to_window(event.timestamp, self.window_minutes);
        let minute = transform::floor_to_minute(event.timestamp);
        let model = event.model.as_str();

        self.store.increment("llm_requests", model, bucket, "request_count", 1).await?;
        if event.success {
            self.store.increment("llm_requests", model, bucket, "success_count", 1).await?;
        } else {
            self.store.increment("llm_requests", model, bucket, "error_count", 1).await?;
        }
        self.store
            .increment("llm_requests", model, bucket, "token_usage.total", (event.prompt_tokens + event.completion_tokens) as i64)
            .await?;
        self.store.increment("llm_requests", model, bucket, "token_usage.prompt", event.prompt_tokens as i64).await?;
        self.store.increment("llm_requests", model, bucket, "token_usage.completion", event.completion_tokens as i64).await?;

        let cost = transform::llm_cost_estimate(event.prompt_tokens, event.completion_tokens);
        self.store.increment_float("llm_requests", model, bucket, "cost_estimate", cost).await?;
        self.store.push_sample("llm_requests", model, bucket, event.latency_ms as f64).await?;

        self.store.incr_time_series_point("llm_requests_per_minute", model, minute, 1).await?;
        self.store
            .increment("llm_requests", model, minute, "tokens_per_minute.total", (event.prompt_tokens + event.completion_tokens) as i64)
            .await?;
        self.store.push_sample("llm_latency_per_minute", model, minute, event.latency_ms as f64).await?;
        if !event.success {
            self.store.increment("llm_requests", model, minute, "errors_per_minute.count", 1).await?;
        }

        self.run_statistics_pass(model, bucket).await?;
        Ok(())
    }

    async fn handle_file(&self, message: &BusMessage) -> eyre::Result<()> {
        let event: FileProcessedEvent = message.deserialize()?;
        let record = transform::transform_file(&event, &self.service, &self.environment);
        self.store.persist_event(&record).await?;

        let bucket = transform::floor_to_window(event.timestamp, self.window_minutes);
        let minute = transform::floor_to_minute(event.timestamp);
        let file_type = "file";

        self.store.increment("file_processed", file_type, bucket, "file_processed_count", 1).await?;
        self.store.increment("file_processed", file_type, bucket, "total_size", event.file_size as i64).await?;
        self.store.increment("file_processed", file_type, bucket, "total_chunks", event.chunk_count as i64).await?;
        self.store.push_sample("file_latency_samples", file_type, bucket, event.latency_ms as f64).await?;
        self.store.incr_time_series_point("files_per_minute", file_type, minute, 1).await?;
        Ok(())
    }

    async fn handle_conversation(&self, message: &BusMessage) -> eyre::Result<()> {
        let event: ConversationEvent = message.deserialize()?;
        let record = transform::transform_conversation(&event, &self.service, &self.environment);
        self.store.persist_event(&record).await?;
        Ok(())
    }

    /// Recompute `p50/p95/p99/avg/min/max/count` for the current and previous
    /// window bucket — the "last two windows" the statistics pass covers, since
    /// a slow message can still land in the window that just closed.
    async fn run_statistics_pass(&self, model: &str, bucket: chrono::DateTime<chrono::Utc>) -> eyre::Result<()> {
        let previous = bucket - chrono::Duration::minutes(self.window_minutes.max(1));
        for candidate in [bucket, previous] {
            let samples = self.store.read_samples("llm_requests", model, candidate).await?;
            if samples.is_empty() {
                continue;
            }
            let stats = compute_latency_stats(&samples);
            self.store.write_latency_stats(model, candidate, stats).await?;
        }
        Ok(())
    }
}
