//! The secondary-bus event emitter (C4): a lazy singleton publisher plus the event
//! payload types carried on `llm.calls`, `file.processing`, and `chatbot.events`.
//!
//! Emission is fire-and-forget: a publish failure is logged and swallowed so a
//! flaky analytics pipeline never affects a chat/file/kb job's own outcome.

use bus::{BusConfig, EventPublisher};
use chrono::{DateTime, Utc};
use core_config::FromEnv;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::warn;
use uuid::Uuid;

pub const LLM_CALLS_SUBJECT: &str = "llm.calls";
pub const FILE_PROCESSING_SUBJECT: &str = "file.processing";
pub const CHATBOT_EVENTS_SUBJECT: &str = "chatbot.events";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponseEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub model: String,
    pub message_preview: String,
    pub latency_ms: u64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub success: bool,
    pub rag_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProcessedEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub file_size: u64,
    pub chunk_count: usize,
    pub latency_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub detail: serde_json::Value,
}

/// The append-only record the analytics consumer writes per processed message:
/// one of the three wire events above, plus the fields the consumer adds on
/// transform (`user_id_hash`, `service`, `environment`, `processed_at`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub user_id_hash: String,
    pub conversation_id: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
    pub service: String,
    pub environment: String,
    pub body: serde_json::Value,
}

/// A windowed aggregate keyed by `(metric, dimension, time_bucket)`, upserted
/// by atomic increment (`value`/`total`) or array-append (`samples`). `dimension`
/// is the LLM model name or the file type, depending on `metric`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowedMetric {
    pub metric: String,
    pub dimension: String,
    pub time_bucket: DateTime<Utc>,
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub samples: Vec<f64>,
}

/// Percentile/summary statistics computed over a `WindowedMetric`'s `samples`,
/// upserted into `latency_stats` keyed by `(model, time_bucket)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// One minute-resolution point in a `metric`'s time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub metric: String,
    pub dimension: String,
    pub minute_bucket: DateTime<Utc>,
    pub value: f64,
}

static PUBLISHER: OnceCell<EventPublisher> = OnceCell::const_new();

async fn publisher() -> Option<&'static EventPublisher> {
    let result = PUBLISHER
        .get_or_try_init(|| async {
            let config = BusConfig::from_env().map_err(|e| e.to_string())?;
            EventPublisher::connect(&config).await.map_err(|e| e.to_string())
        })
        .await;

    match result {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            warn!(error = %e, "secondary bus event publisher unavailable, dropping event");
            None
        }
    }
}

/// Publish an `LLM_RESPONSE` event. Swallows any failure (unreachable bus,
/// unresolved config) after logging it.
pub async fn emit_llm_event(event: LlmResponseEvent) {
    emit(LLM_CALLS_SUBJECT, &event).await;
}

/// Publish a `FILE_PROCESSED` event.
pub async fn emit_file_event(event: FileProcessedEvent) {
    emit(FILE_PROCESSING_SUBJECT, &event).await;
}

/// Publish a generic lifecycle event (conversation created, title updated, etc).
pub async fn emit_conversation_event(event: ConversationEvent) {
    emit(CHATBOT_EVENTS_SUBJECT, &event).await;
}

async fn emit<T: Serialize>(subject: &str, event: &T) {
    let Some(publisher) = publisher().await else {
        return;
    };
    if let Err(e) = publisher.publish(subject, event).await {
        warn!(error = %e, subject, "failed to publish event to secondary bus");
    }
}

/// `samples[floor(n*p)]`, clamped to the last index when that would overrun —
/// the percentile index formula the analytics statistics pass uses for every
/// `p`. `samples` must already be sorted ascending.
pub fn percentile(sorted_samples: &[f64], p: f64) -> f64 {
    let n = sorted_samples.len();
    if n == 0 {
        return 0.0;
    }
    let index = ((n as f64) * p).floor() as usize;
    sorted_samples[index.min(n - 1)]
}

/// Sort `samples` and compute the full `latency_stats` summary in one pass.
pub fn compute_latency_stats(samples: &[f64]) -> LatencyStats {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = sorted.len();
    let (min, max, avg) = if count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        (sorted[0], sorted[count - 1], sorted.iter().sum::<f64>() / count as f64)
    };
    LatencyStats {
        p50: percentile(&sorted, 0.5),
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
        avg,
        min,
        max,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_event_serializes_with_stable_event_type() {
        let event = LlmResponseEvent {
            event_type: "LLM_RESPONSE".to_string(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            model: "gpt-4o".to_string(),
            message_preview: "hi th**e*".to_string(),
            latency_ms: 120,
            prompt_tokens: 42,
            completion_tokens: 10,
            success: true,
            rag_used: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"LLM_RESPONSE\""));
        // chrono serializes DateTime<Utc> as an RFC3339 string by default.
        assert!(json.contains('T'));
    }

    #[test]
    fn percentile_matches_literal_sample_scenario() {
        let samples: Vec<f64> = vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        assert_eq!(percentile(&samples, 0.5), 60.0);
        assert_eq!(percentile(&samples, 0.95), 100.0);
        assert_eq!(percentile(&samples, 0.99), 100.0);
    }

    #[test]
    fn percentile_clamps_to_last_index_for_small_samples() {
        let samples = vec![5.0];
        assert_eq!(percentile(&samples, 0.5), 5.0);
        assert_eq!(percentile(&samples, 0.99), 5.0);
    }

    #[test]
    fn compute_latency_stats_sorts_before_computing() {
        let stats = compute_latency_stats(&[100.0, 10.0, 50.0]);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.count, 3);
        assert!((stats.avg - 53.333333333333336).abs() < 1e-9);
    }
}
