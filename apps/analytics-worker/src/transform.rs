//! Per-event transform: time bucketing, the one-way user-id hash, and the
//! `AnalyticsEvent` envelope the statistics pass and store consume.

use chatcore::analytics::{ConversationEvent, FileProcessedEvent, LlmResponseEvent};
use chatcore::AnalyticsEvent;
use chrono::{DateTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Floor `timestamp` to an N-minute boundary: `minute <- (minute / window) * window`,
/// seconds and sub-second components zeroed. `timestamp` is already UTC — this
/// crate never constructs naive datetimes.
pub fn floor_to_window(timestamp: DateTime<Utc>, window_minutes: i64) -> DateTime<Utc> {
    let window = window_minutes.max(1);
    let floored_minute = (timestamp.minute() as i64 / window) * window;
    timestamp
        .with_minute(floored_minute as u32)
        .expect("floored minute is always in 0..60")
        .with_second(0)
        .expect("0 is a valid second")
        .with_nanosecond(0)
        .expect("0 is a valid nanosecond")
}

/// The minute-resolution bucket used for `time_series` points (window = 1).
pub fn floor_to_minute(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    floor_to_window(timestamp, 1)
}

/// One-way, truncated identifier: the first 16 hex characters (8 bytes) of
/// `SHA-256(user_id)`. Used so `analytics_events` never carries a reversible
/// user identifier.
pub fn user_id_hash(user_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// `prompt·5.9e-7 + completion·7.9e-7` USD, the per-call cost estimate.
pub fn llm_cost_estimate(prompt_tokens: u32, completion_tokens: u32) -> f64 {
    prompt_tokens as f64 * 5.9e-7 + completion_tokens as f64 * 7.9e-7
}

pub fn transform_llm(event: &LlmResponseEvent, service: &str, environment: &str) -> AnalyticsEvent {
    AnalyticsEvent {
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        user_id_hash: user_id_hash(event.user_id),
        conversation_id: Some(event.conversation_id),
        processed_at: Utc::now(),
        service: service.to_string(),
        environment: environment.to_string(),
        body: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    }
}

pub fn transform_file(event: &FileProcessedEvent, service: &str, environment: &str) -> AnalyticsEvent {
    AnalyticsEvent {
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        user_id_hash: user_id_hash(event.user_id),
        conversation_id: None,
        processed_at: Utc::now(),
        service: service.to_string(),
        environment: environment.to_string(),
        body: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    }
}

pub fn transform_conversation(event: &ConversationEvent, service: &str, environment: &str) -> AnalyticsEvent {
    AnalyticsEvent {
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        user_id_hash: user_id_hash(event.user_id),
        conversation_id: Some(event.conversation_id),
        processed_at: Utc::now(),
        service: service.to_string(),
        environment: environment.to_string(),
        body: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    }
}

/// The record inserted when processing a single event fails — logged, never
/// surfaced, and the consumer continues with the next message.
pub fn processing_error_event(subject: &str, error: &str, service: &str, environment: &str) -> AnalyticsEvent {
    AnalyticsEvent {
        event_type: "PROCESSING_ERROR".to_string(),
        timestamp: Utc::now(),
        user_id_hash: String::new(),
        conversation_id: None,
        processed_at: Utc::now(),
        service: service.to_string(),
        environment: environment.to_string(),
        body: serde_json::json!({ "subject": subject, "error": error }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floor_to_window_zeroes_seconds_and_rounds_down_to_boundary() {
        let timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 10, 7, 42).unwrap();
        let bucketed = floor_to_window(timestamp, 5);
        assert_eq!(bucketed, Utc.with_ymd_and_hms(2026, 8, 1, 10, 5, 0).unwrap());
    }

    #[test]
    fn floor_to_minute_uses_window_of_one() {
        let timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 10, 7, 42).unwrap();
        assert_eq!(floor_to_minute(timestamp), Utc.with_ymd_and_hms(2026, 8, 1, 10, 7, 0).unwrap());
    }

    #[test]
    fn user_id_hash_is_sixteen_hex_chars_and_deterministic() {
        let id = Uuid::new_v4();
        let hash = user_id_hash(id);
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, user_id_hash(id));
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cost_estimate_matches_the_per_token_formula() {
        let estimate = llm_cost_estimate(1000, 500);
        assert!((estimate - (1000.0 * 5.9e-7 + 500.0 * 7.9e-7)).abs() < 1e-12);
    }
}
