//! Redis-backed storage for the three collections this service exclusively
//! owns: `analytics_events`, `analytics_metrics`, `time_series`.
//!
//! Grounded on `job_queue::producer`/`consumer`'s raw-`redis::cmd` idiom for
//! commands the `AsyncCommands` convenience trait doesn't cover (`HINCRBYFLOAT`),
//! and on `apps/gateway`'s `conversation_store` for the append-only-list idiom.

use chatcore::{AnalyticsEvent, LatencyStats};
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

const EVENTS_KEY: &str = "analytics:events";
const EVENTS_CAP: isize = 50_000;

fn bucket_key(metric: &str, dimension: &str, bucket: DateTime<Utc>) -> String {
    format!("analytics:metric:{metric}:{dimension}:{}", bucket.to_rfc3339())
}

fn samples_key(metric: &str, dimension: &str, bucket: DateTime<Utc>) -> String {
    format!("{}:samples", bucket_key(metric, dimension, bucket))
}

fn stats_key(model: &str, bucket: DateTime<Utc>) -> String {
    format!("analytics:latency_stats:{model}:{}", bucket.to_rfc3339())
}

fn minute_series_key(metric: &str, dimension: &str, minute: DateTime<Utc>) -> String {
    format!("analytics:time_series:{metric}:{dimension}:{}", minute.to_rfc3339())
}

fn encode_err(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "encoding analytics record", e.to_string()))
}

#[derive(Clone)]
pub struct AnalyticsStore {
    conn: redis::aio::ConnectionManager,
}

impl AnalyticsStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Append a transformed event to the append-only `analytics_events` log,
    /// bounded to the most recent `EVENTS_CAP` entries.
    pub async fn persist_event(&self, event: &AnalyticsEvent) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(event).map_err(encode_err)?;
        conn.rpush::<_, _, ()>(EVENTS_KEY, body).await?;
        conn.ltrim::<_, ()>(EVENTS_KEY, -EVENTS_CAP, -1).await?;
        Ok(())
    }

    /// Upsert-increment an integer counter field in a windowed bucket
    /// (e.g. `request_count`, `token_usage.prompt`).
    pub async fn increment(
        &self,
        metric: &str,
        dimension: &str,
        bucket: DateTime<Utc>,
        field: &str,
        delta: i64,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.hincr::<_, _, _, ()>(bucket_key(metric, dimension, bucket), field, delta).await
    }

    /// Upsert-increment a float field (used for `cost_estimate`, which accrues
    /// fractional USD per call).
    pub async fn increment_float(
        &self,
        metric: &str,
        dimension: &str,
        bucket: DateTime<Utc>,
        field: &str,
        delta: f64,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("HINCRBYFLOAT")
            .arg(bucket_key(metric, dimension, bucket))
            .arg(field)
            .arg(delta)
            .query_async::<()>(&mut conn)
            .await
    }

    /// Upsert-push a latency sample onto a bucket's `samples` list. Returns
    /// the bucket's identity so the caller can decide whether to re-run the
    /// statistics pass for it.
    pub async fn push_sample(
        &self,
        metric: &str,
        dimension: &str,
        bucket: DateTime<Utc>,
        value: f64,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(samples_key(metric, dimension, bucket), value).await
    }

    pub async fn read_samples(
        &self,
        metric: &str,
        dimension: &str,
        bucket: DateTime<Utc>,
    ) -> redis::RedisResult<Vec<f64>> {
        let mut conn = self.conn.clone();
        conn.lrange(samples_key(metric, dimension, bucket), 0, -1).await
    }

    pub async fn write_latency_stats(
        &self,
        model: &str,
        bucket: DateTime<Utc>,
        stats: LatencyStats,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&stats).map_err(encode_err)?;
        conn.set::<_, _, ()>(stats_key(model, bucket), body).await
    }

    pub async fn incr_time_series_point(
        &self,
        metric: &str,
        dimension: &str,
        minute: DateTime<Utc>,
        delta: i64,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.incr::<_, _, ()>(minute_series_key(metric, dimension, minute), delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_keys_are_namespaced_by_metric_dimension_and_bucket() {
        let bucket = DateTime::parse_from_rfc3339("2026-08-01T10:05:00Z").unwrap().with_timezone(&Utc);
        let key = bucket_key("llm_requests", "gpt-4o", bucket);
        assert_eq!(key, "analytics:metric:llm_requests:gpt-4o:2026-08-01T10:05:00+00:00");
        assert_eq!(samples_key("llm_requests", "gpt-4o", bucket), format!("{key}:samples"));
    }
}
