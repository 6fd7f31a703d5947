//! Redis stream consumer: consumer-group management, reading, acknowledging, and
//! claiming abandoned messages for the job queue worker pool.

use crate::config::WorkerConfig;
use crate::envelope::JobEnvelope;
use crate::error::{JobQueueError, JobQueueResult};
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One message read off the stream: its entry ID plus either a parsed envelope
/// or the parse error (for messages that fail to decode as a `JobEnvelope`).
pub struct ConsumedMessage {
    pub stream_id: String,
    pub envelope: Result<JobEnvelope, String>,
}

#[derive(Clone)]
pub struct StreamConsumer {
    redis: Arc<ConnectionManager>,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self {
            redis: Arc::new(redis),
            config,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Create the consumer group (and stream, via MKSTREAM) if it doesn't exist yet.
    pub async fn ensure_consumer_group(&self) -> JobQueueResult<()> {
        let mut conn = (*self.redis).clone();

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(group = %self.config.consumer_group, "created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(JobQueueError::ConsumerGroup(e.to_string())),
        }
    }

    /// Read this consumer's own still-pending messages (delivered but never ACKed),
    /// using stream ID "0". Used once at startup before switching to new messages.
    pub async fn read_pending_messages(&self) -> JobQueueResult<Vec<ConsumedMessage>> {
        let mut conn = (*self.redis).clone();
        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size);

        let result: Result<StreamReadReply, _> = conn
            .xread_options(&[&self.config.stream_name], &["0"], &opts)
            .await;

        match result {
            Ok(reply) => Ok(Self::parse_messages(reply)),
            Err(e) if is_block_timeout(&e) => Ok(vec![]),
            Err(e) => Err(JobQueueError::Redis(e)),
        }
    }

    /// Read new messages (stream ID ">"), blocking up to `block_timeout_ms`.
    pub async fn read_new_messages(&self) -> JobQueueResult<Vec<ConsumedMessage>> {
        let mut conn = (*self.redis).clone();
        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size)
            .block(self.config.block_timeout_ms as usize);

        let result: Result<StreamReadReply, _> = conn
            .xread_options(&[&self.config.stream_name], &[">"], &opts)
            .await;

        match result {
            Ok(reply) => {
                let messages = Self::parse_messages(reply);
                if !messages.is_empty() {
                    debug!(count = messages.len(), "received new messages");
                }
                Ok(messages)
            }
            Err(e) if is_block_timeout(&e) => Ok(vec![]),
            Err(e) => Err(JobQueueError::Redis(e)),
        }
    }

    fn parse_messages(reply: StreamReadReply) -> Vec<ConsumedMessage> {
        let mut out = Vec::new();
        for stream_key in reply.keys {
            for message in stream_key.ids {
                let envelope = Self::parse_envelope(&message.map)
                    .map_err(|e| e.to_string());
                out.push(ConsumedMessage {
                    stream_id: message.id,
                    envelope,
                });
            }
        }
        out
    }

    fn parse_envelope(map: &HashMap<String, redis::Value>) -> JobQueueResult<JobEnvelope> {
        let job_value = map
            .get("job")
            .ok_or_else(|| JobQueueError::JobParsing("missing 'job' field".to_string()))?;

        let job_str = match job_value {
            redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
            redis::Value::SimpleString(s) => s.clone(),
            _ => return Err(JobQueueError::JobParsing("invalid 'job' field type".to_string())),
        };

        Ok(serde_json::from_str(&job_str)?)
    }

    pub async fn ack(&self, message_id: &str) -> JobQueueResult<()> {
        let mut conn = (*self.redis).clone();
        let _: () = conn
            .xack(&self.config.stream_name, &self.config.consumer_group, &[message_id])
            .await?;
        debug!(message_id, "acknowledged message");
        Ok(())
    }

    /// Claim every pending message for this group on worker startup, regardless of
    /// idle time, so a restarted consumer recovers the previous consumer ID's work.
    pub async fn claim_all_pending_on_startup(&self) -> JobQueueResult<usize> {
        let mut conn = (*self.redis).clone();
        let mut total = 0usize;
        let mut start_id = "0-0".to_string();

        loop {
            let result: redis::Value = redis::cmd("XAUTOCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_id)
                .arg(0)
                .arg(&start_id)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .unwrap_or(redis::Value::Nil);

            let Some((next_id, claimed)) = parse_autoclaim(&result) else {
                break;
            };
            total += claimed;
            if next_id == "0-0" || claimed == 0 {
                break;
            }
            start_id = next_id;
        }

        if total > 0 {
            info!(count = total, consumer = %self.config.consumer_id, "claimed pending messages on startup");
        }
        Ok(total)
    }

    /// Claim messages idle longer than `claim_idle_ms`, abandoned by crashed workers.
    pub async fn claim_abandoned_messages(&self) -> JobQueueResult<usize> {
        let mut conn = (*self.redis).clone();
        let result: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(10)
            .query_async(&mut conn)
            .await
            .unwrap_or(redis::Value::Nil);

        let claimed = parse_autoclaim(&result).map(|(_, n)| n).unwrap_or(0);
        if claimed > 0 {
            info!(count = claimed, consumer = %self.config.consumer_id, "claimed abandoned messages");
        }
        Ok(claimed)
    }
}

fn is_block_timeout(e: &redis::RedisError) -> bool {
    let s = e.to_string().to_lowercase();
    s.contains("timeout") || s.contains("timed out") || (s.contains("response") && s.contains("type"))
}

/// Parse `[next-start-id, [[msg-id, fields], ...], [deleted-ids]]` into (next_id, claimed_count).
fn parse_autoclaim(value: &redis::Value) -> Option<(String, usize)> {
    let redis::Value::Array(arr) = value else {
        return None;
    };
    if arr.len() < 2 {
        return None;
    }
    let redis::Value::BulkString(next_id) = &arr[0] else {
        return None;
    };
    let redis::Value::Array(messages) = &arr[1] else {
        return None;
    };
    Some((String::from_utf8_lossy(next_id).to_string(), messages.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_autoclaim_reads_next_id_and_count() {
        let value = redis::Value::Array(vec![
            redis::Value::BulkString(b"123-0".to_vec()),
            redis::Value::Array(vec![redis::Value::Nil, redis::Value::Nil]),
            redis::Value::Array(vec![]),
        ]);
        let (next_id, count) = parse_autoclaim(&value).unwrap();
        assert_eq!(next_id, "123-0");
        assert_eq!(count, 2);
    }

    #[test]
    fn parse_autoclaim_rejects_malformed_reply() {
        assert!(parse_autoclaim(&redis::Value::Nil).is_none());
    }
}
