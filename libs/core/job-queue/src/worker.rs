//! The worker pool: reads `JobEnvelope`s off the primary stream, dispatches them to a
//! `JobHandler`, and on failure either requeues (via the retry policy) or dead-letters.

use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::dlq::DlqStore;
use crate::envelope::JobEnvelope;
use crate::error::JobQueueResult;
use crate::producer::JobProducer;
use crate::registry::JobHandler;
use crate::result_channel::{JobType, ProgressRecord, ResultChannel};
use crate::retry::RetryPolicy;
use observability::JobMetrics;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

fn job_type_of(envelope: &JobEnvelope) -> JobType {
    match envelope {
        JobEnvelope::Chat { .. } => JobType::Chat,
        JobEnvelope::File { .. } => JobType::File,
        JobEnvelope::Kb { .. } => JobType::Kb,
    }
}

/// Pool of concurrent workers draining one Redis stream.
pub struct WorkerPool<H: JobHandler + 'static> {
    consumer: StreamConsumer,
    producer: JobProducer,
    dlq: DlqStore,
    result_channel: ResultChannel,
    handler: Arc<H>,
    retry_policy: RetryPolicy,
    config: WorkerConfig,
    semaphore: Arc<Semaphore>,
}

impl<H: JobHandler + 'static> WorkerPool<H> {
    pub fn new(
        redis: ConnectionManager,
        handler: Arc<H>,
        config: WorkerConfig,
        retry_policy: RetryPolicy,
    ) -> Self {
        let consumer = StreamConsumer::new(redis.clone(), config.clone());
        let producer = JobProducer::new(redis.clone(), config.stream_name.clone());
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        Self {
            consumer,
            producer,
            dlq: DlqStore::new(redis.clone()),
            result_channel: ResultChannel::new(redis),
            handler,
            retry_policy,
            config,
            semaphore,
        }
    }

    /// Run until `shutdown` observes `true`. Claims this consumer's own pending
    /// messages on startup (crash recovery), then alternates reading new messages
    /// and sweeping for abandoned ones left by other, dead, consumers.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> JobQueueResult<()> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            processor = %self.handler.name(),
            "starting worker pool"
        );

        self.consumer.ensure_consumer_group().await?;
        if let Err(e) = self.consumer.claim_all_pending_on_startup().await {
            warn!(error = %e, "failed to claim pending messages on startup");
        }

        let claim_interval = Duration::from_millis(self.config.claim_interval_ms);
        let mut last_claim = tokio::time::Instant::now();

        loop {
            if *shutdown.borrow() {
                info!("shutdown signal received, stopping worker pool");
                break;
            }

            match self.drain_once().await {
                Ok(()) => {}
                Err(e) if e.is_block_timeout() => continue,
                Err(e) if e.is_nogroup_error() => {
                    warn!("consumer group missing, recreating");
                    if let Err(create_err) = self.consumer.ensure_consumer_group().await {
                        error!(error = %create_err, "failed to recreate consumer group");
                    }
                }
                Err(e) => {
                    error!(error = %e, "error draining stream, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }

            if last_claim.elapsed() >= claim_interval {
                if let Err(e) = self.consumer.claim_abandoned_messages().await {
                    debug!(error = %e, "error claiming abandoned messages");
                }
                last_claim = tokio::time::Instant::now();
            }
        }

        info!("worker pool stopped");
        Ok(())
    }

    async fn drain_once(&self) -> JobQueueResult<()> {
        let pending = self.consumer.read_pending_messages().await?;
        let fresh = self.consumer.read_new_messages().await?;
        let messages: Vec<_> = pending.into_iter().chain(fresh).collect();
        if messages.is_empty() {
            return Ok(());
        }

        JobMetrics::set_queue_depth(&self.config.stream_name, messages.len() as u64);

        let mut join_set: JoinSet<()> = JoinSet::new();
        for message in messages {
            let semaphore = Arc::clone(&self.semaphore);
            let handler = Arc::clone(&self.handler);
            let consumer = self.consumer.clone();
            let producer = self.producer.clone();
            let dlq = self.dlq.clone();
            let result_channel = self.result_channel.clone();
            let retry_policy = self.retry_policy;

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                process_one(
                    &consumer,
                    &producer,
                    &dlq,
                    &result_channel,
                    &handler,
                    retry_policy,
                    message,
                )
                .await;
            });
        }

        while join_set.join_next().await.is_some() {}
        Ok(())
    }
}

async fn process_one<H: JobHandler>(
    consumer: &StreamConsumer,
    producer: &JobProducer,
    dlq: &DlqStore,
    result_channel: &ResultChannel,
    handler: &Arc<H>,
    retry_policy: RetryPolicy,
    message: crate::consumer::ConsumedMessage,
) {
    let envelope = match message.envelope {
        Ok(envelope) => envelope,
        Err(parse_error) => {
            warn!(message_id = %message.stream_id, error = %parse_error, "unparseable message, acking and dropping");
            let _ = consumer.ack(&message.stream_id).await;
            return;
        }
    };

    let correlation_id = envelope.correlation_id();
    let job_type = job_type_of(&envelope);
    let retry_count = envelope.retry_meta().map(|m| m.retry_count).unwrap_or(0);

    // A message already tagged for retry waits out its backoff here, at consume
    // time, rather than holding a worker slot between requeue-decision and
    // requeue-publish. This keeps the retry envelope safely on the stream (and
    // the original message acked) the moment the decision is made, so a crash
    // mid-wait can never lose the job.
    if retry_count > 0 {
        let delay = retry_policy.delay_for_attempt(retry_count - 1);
        tokio::time::sleep(delay).await;
    }

    let _ = result_channel
        .write(correlation_id, &ProgressRecord::processing(job_type))
        .await;

    JobMetrics::record_dispatched(envelope.original_topic());
    let start = std::time::Instant::now();

    match handler.handle(&envelope).await {
        Ok(outcome) => {
            JobMetrics::record_completed(envelope.original_topic(), start.elapsed().as_secs_f64());
            let record = ProgressRecord::processing(job_type).completed(outcome.reply, outcome.title);
            if let Err(e) = result_channel.write(correlation_id, &record).await {
                error!(error = %e, %correlation_id, "failed to write completed result");
            }
            if let Err(e) = consumer.ack(&message.stream_id).await {
                error!(error = %e, message_id = %message.stream_id, "failed to ack message");
            }
        }
        Err(err) => {
            if retry_policy.should_retry(&err, retry_count) {
                JobMetrics::record_retried(envelope.original_topic(), retry_count + 1);
                let record = ProgressRecord::processing(job_type)
                    .retrying(retry_count + 1, retry_policy.max_retries);
                let _ = result_channel.write(correlation_id, &record).await;

                let retried_envelope = envelope.clone().into_retry(err.clone());
                if let Err(e) = producer.send(&retried_envelope).await {
                    error!(error = %e, %correlation_id, "failed to requeue job for retry");
                }
            } else {
                JobMetrics::record_dead_lettered(envelope.original_topic());
                let body = serde_json::to_string(&envelope).unwrap_or_default();
                if let Err(e) = dlq
                    .save(correlation_id, envelope.original_topic(), &body, &err)
                    .await
                {
                    error!(error = %e, %correlation_id, "failed to persist dead-lettered job");
                }
                let record = ProgressRecord::processing(job_type).errored(err);
                let _ = result_channel.write(correlation_id, &record).await;
            }

            if let Err(e) = consumer.ack(&message.stream_id).await {
                error!(error = %e, message_id = %message.stream_id, "failed to ack message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ChatPayload, CorrelationId};
    use uuid::Uuid;

    #[test]
    fn job_type_of_matches_envelope_variant() {
        let envelope = JobEnvelope::Chat {
            correlation_id: CorrelationId::new(),
            payload: ChatPayload {
                conversation_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                message: "hi".to_string(),
                generate_title: false,
            },
            retry_meta: None,
        };
        assert_eq!(job_type_of(&envelope), JobType::Chat);
    }
}
