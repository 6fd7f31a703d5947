//! Dead-letter store: persisted records of jobs that exhausted retries, with the
//! admin operations the gateway exposes (list, get, retry, resolve, delete, stats).

use crate::envelope::CorrelationId;
use crate::error::{JobQueueError, JobQueueResult};
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a dead-lettered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    Pending,
    Retried,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqRecord {
    pub id: Uuid,
    pub correlation_id: CorrelationId,
    pub original_topic: String,
    pub message_data: String,
    pub last_error: String,
    pub retry_count: u32,
    pub error_history: Vec<String>,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub status: DlqStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retried_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqStats {
    pub pending: u64,
    pub retried: u64,
    pub resolved: u64,
    pub total: u64,
}

const RECORDS_KEY: &str = "dlq:records";
const CORR_INDEX_KEY: &str = "dlq:by_correlation_id";
const ORDER_KEY: &str = "dlq:order";

/// Redis-backed dead-letter store, keyed by record id with a correlation-id index
/// that enforces the one-record-per-correlation-id uniqueness invariant.
#[derive(Clone)]
pub struct DlqStore {
    conn: redis::aio::ConnectionManager,
}

impl DlqStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Save a newly failed job. If a record already exists for this correlation id,
    /// its error is appended to `error_history` instead of creating a duplicate.
    pub async fn save(
        &self,
        correlation_id: CorrelationId,
        original_topic: &str,
        message_data: &str,
        error: &str,
    ) -> JobQueueResult<DlqRecord> {
        let mut conn = self.conn.clone();
        let now = Utc::now();

        if let Some(existing_id) = self.lookup_id_by_correlation(&mut conn, correlation_id).await? {
            let mut record = self.get(existing_id).await?.ok_or_else(|| {
                JobQueueError::Internal("dlq correlation index pointed at missing record".into())
            })?;
            record.error_history.push(record.last_error.clone());
            record.last_error = error.to_string();
            record.retry_count += 1;
            record.last_failed_at = now;
            record.status = DlqStatus::Pending;
            self.persist(&mut conn, &record).await?;
            return Ok(record);
        }

        let record = DlqRecord {
            id: Uuid::new_v4(),
            correlation_id,
            original_topic: original_topic.to_string(),
            message_data: message_data.to_string(),
            last_error: error.to_string(),
            retry_count: 0,
            error_history: Vec::new(),
            first_failed_at: now,
            last_failed_at: now,
            status: DlqStatus::Pending,
            created_at: now,
            retried_at: None,
            resolved_at: None,
        };

        self.persist(&mut conn, &record).await?;
        let _: () = conn
            .hset(CORR_INDEX_KEY, correlation_id.to_string(), record.id.to_string())
            .await?;
        let _: () = conn
            .zadd(ORDER_KEY, record.id.to_string(), now.timestamp_millis())
            .await?;

        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> JobQueueResult<Option<DlqRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(RECORDS_KEY, id.to_string()).await?;
        Ok(match raw {
            Some(body) => Some(serde_json::from_str(&body)?),
            None => None,
        })
    }

    pub async fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> JobQueueResult<Option<DlqRecord>> {
        let mut conn = self.conn.clone();
        match self.lookup_id_by_correlation(&mut conn, correlation_id).await? {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    /// List records newest-first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<DlqStatus>,
        limit: usize,
        offset: usize,
    ) -> JobQueueResult<Vec<DlqRecord>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(ORDER_KEY, 0, -1).await?;

        let mut records = Vec::new();
        for id in ids.into_iter().skip(offset) {
            let raw: Option<String> = conn.hget(RECORDS_KEY, &id).await?;
            if let Some(body) = raw {
                let record: DlqRecord = serde_json::from_str(&body)?;
                if status.is_none_or(|s| s == record.status) {
                    records.push(record);
                    if records.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(records)
    }

    /// Fetch every record regardless of status, used for stats aggregation.
    async fn all(&self) -> JobQueueResult<Vec<DlqRecord>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(ORDER_KEY, 0, -1).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let raw: Option<String> = conn.hget(RECORDS_KEY, &id).await?;
            if let Some(body) = raw {
                records.push(serde_json::from_str(&body)?);
            }
        }
        Ok(records)
    }

    pub async fn mark_retried(&self, id: Uuid) -> JobQueueResult<DlqRecord> {
        let mut conn = self.conn.clone();
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(format!("dlq record {id}")))?;
        record.status = DlqStatus::Retried;
        record.retried_at = Some(Utc::now());
        self.persist(&mut conn, &record).await?;
        Ok(record)
    }

    pub async fn mark_resolved(&self, id: Uuid) -> JobQueueResult<DlqRecord> {
        let mut conn = self.conn.clone();
        let mut record = self
            .get(id)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(format!("dlq record {id}")))?;
        record.status = DlqStatus::Resolved;
        record.resolved_at = Some(Utc::now());
        self.persist(&mut conn, &record).await?;
        Ok(record)
    }

    pub async fn delete(&self, id: Uuid) -> JobQueueResult<bool> {
        let mut conn = self.conn.clone();
        let record = self.get(id).await?;
        let removed: i64 = conn.hdel(RECORDS_KEY, id.to_string()).await?;
        let _: i64 = conn.zrem(ORDER_KEY, id.to_string()).await?;
        if let Some(record) = record {
            let _: i64 = conn
                .hdel(CORR_INDEX_KEY, record.correlation_id.to_string())
                .await?;
        }
        Ok(removed > 0)
    }

    pub async fn stats(&self) -> JobQueueResult<DlqStats> {
        let all = self.all().await?;
        let mut stats = DlqStats {
            pending: 0,
            retried: 0,
            resolved: 0,
            total: all.len() as u64,
        };
        for record in &all {
            match record.status {
                DlqStatus::Pending => stats.pending += 1,
                DlqStatus::Retried => stats.retried += 1,
                DlqStatus::Resolved => stats.resolved += 1,
            }
        }
        Ok(stats)
    }

    async fn lookup_id_by_correlation(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        correlation_id: CorrelationId,
    ) -> JobQueueResult<Option<Uuid>> {
        let raw: Option<String> = conn.hget(CORR_INDEX_KEY, correlation_id.to_string()).await?;
        Ok(raw.and_then(|s| Uuid::parse_str(&s).ok()))
    }

    async fn persist(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        record: &DlqRecord,
    ) -> JobQueueResult<()> {
        let body = serde_json::to_string(record)?;
        let _: () = conn.hset(RECORDS_KEY, record.id.to_string(), body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_record_serializes_with_optional_fields_omitted() {
        let record = DlqRecord {
            id: Uuid::new_v4(),
            correlation_id: CorrelationId::new(),
            original_topic: "chat".to_string(),
            message_data: "{}".to_string(),
            last_error: "connection reset".to_string(),
            retry_count: 5,
            error_history: vec!["timeout".to_string()],
            first_failed_at: Utc::now(),
            last_failed_at: Utc::now(),
            status: DlqStatus::Pending,
            created_at: Utc::now(),
            retried_at: None,
            resolved_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("retried_at"));
        assert!(!json.contains("resolved_at"));
    }
}
