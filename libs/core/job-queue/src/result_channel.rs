//! Result Channel: a bounded-TTL Redis key-value store holding per-correlation-id
//! progress/result documents, polled by the gateway to stream partial results back
//! to the caller.

use crate::envelope::CorrelationId;
use crate::error::{JobQueueError, JobQueueResult};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job as observed through the result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Streaming,
    Completed,
    Error,
    Retrying,
}

/// Which handler produced this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Chat,
    File,
    Kb,
}

/// The document stored at `result:<correlation_id>`.
///
/// Invariant: once `finished` is set to `true` it is never overwritten back to
/// `false`. `completed` and `error` imply `finished = true`; `streaming` implies
/// `finished = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: ProgressStatus,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub reply: String,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
}

impl ProgressRecord {
    pub fn processing(job_type: JobType) -> Self {
        Self {
            status: ProgressStatus::Processing,
            job_type,
            reply: String::new(),
            finished: false,
            title: None,
            error: None,
            retry_count: None,
            max_retry: None,
        }
    }

    /// Apply an incremental streamed chunk, keeping the record unfinished.
    pub fn with_streamed_chunk(mut self, chunk: &str) -> Self {
        self.status = ProgressStatus::Streaming;
        self.reply.push_str(chunk);
        self.finished = false;
        self
    }

    pub fn completed(mut self, reply: String, title: Option<String>) -> Self {
        self.status = ProgressStatus::Completed;
        self.reply = reply;
        self.title = title;
        self.finished = true;
        self
    }

    pub fn errored(mut self, error: String) -> Self {
        self.status = ProgressStatus::Error;
        self.error = Some(error);
        self.finished = true;
        self
    }

    pub fn retrying(mut self, retry_count: u32, max_retry: u32) -> Self {
        self.status = ProgressStatus::Retrying;
        self.retry_count = Some(retry_count);
        self.max_retry = Some(max_retry);
        self.finished = false;
        self
    }
}

const DEFAULT_TTL_SECS: u64 = 300;

fn result_key(id: CorrelationId) -> String {
    format!("result:{id}")
}

/// Redis-backed result channel. Holds a connection manager so callers can be cloned
/// cheaply and shared across worker tasks.
#[derive(Clone)]
pub struct ResultChannel {
    conn: redis::aio::ConnectionManager,
    ttl_secs: u64,
}

impl ResultChannel {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self {
            conn,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Write a progress record, guaranteeing the finished invariant is never violated:
    /// a write that would flip an already-finished record back to unfinished is rejected.
    pub async fn write(&self, id: CorrelationId, record: &ProgressRecord) -> JobQueueResult<()> {
        let mut conn = self.conn.clone();
        let key = result_key(id);

        if !record.finished {
            if let Some(existing) = self.read_raw(&mut conn, &key).await? {
                if existing.finished {
                    return Err(JobQueueError::Internal(format!(
                        "refusing to unfinish already-finished record for {id}"
                    )));
                }
            }
        }

        let body = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(&key, body, self.ttl_secs).await?;
        Ok(())
    }

    pub async fn read(&self, id: CorrelationId) -> JobQueueResult<Option<ProgressRecord>> {
        let mut conn = self.conn.clone();
        self.read_raw(&mut conn, &result_key(id)).await
    }

    /// Delete the record, typically called by the gateway once it has observed
    /// `finished = true` and streamed the terminal state back to the caller.
    pub async fn delete(&self, id: CorrelationId) -> JobQueueResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(result_key(id)).await?;
        Ok(())
    }

    async fn read_raw(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        key: &str,
    ) -> JobQueueResult<Option<ProgressRecord>> {
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_record_transitions_preserve_finished_semantics() {
        let record = ProgressRecord::processing(JobType::Chat);
        assert!(!record.finished);

        let streaming = record.with_streamed_chunk("partial");
        assert!(!streaming.finished);
        assert_eq!(streaming.status, ProgressStatus::Streaming);

        let done = streaming.completed("full reply".to_string(), Some("Title".to_string()));
        assert!(done.finished);
        assert_eq!(done.status, ProgressStatus::Completed);
    }

    #[test]
    fn result_key_format() {
        let id = CorrelationId::new();
        assert_eq!(result_key(id), format!("result:{id}"));
    }
}
