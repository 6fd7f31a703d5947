//! Wire format for jobs placed on the primary bus: the tagged-union `JobEnvelope`
//! and its per-topic payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, unique identifier correlating a gateway request to its job, result-channel
/// record, and (on failure) dead-letter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Metadata carried on a job that has been requeued onto the retry topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryMeta {
    pub retry_count: u32,
    pub last_error: String,
    pub original_topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPayload {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub generate_title: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilePayload {
    pub file_id: Uuid,
    pub file_path: String,
    pub file_type: String,
    pub original_name: String,
    pub file_size: u64,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub file_record_id: Uuid,
}

/// Whether a `kb` topic message ingests a new document or deletes an existing one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KbAction {
    Ingest,
    Delete,
}

impl Default for KbAction {
    fn default() -> Self {
        Self::Ingest
    }
}

/// A `kb` topic message. `Ingest` carries the full file reference; `Delete` carries
/// only `file_id`, the other fields left `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KbPayload {
    #[serde(default)]
    pub action: KbAction,
    pub file_id: Uuid,
    pub record_id: Option<Uuid>,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub original_name: Option<String>,
}

/// A job enqueued on the primary bus, tagged by topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum JobEnvelope {
    Chat {
        correlation_id: CorrelationId,
        payload: ChatPayload,
        retry_meta: Option<RetryMeta>,
    },
    File {
        correlation_id: CorrelationId,
        payload: FilePayload,
        retry_meta: Option<RetryMeta>,
    },
    Kb {
        correlation_id: CorrelationId,
        payload: KbPayload,
        retry_meta: Option<RetryMeta>,
    },
}

impl JobEnvelope {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Chat { correlation_id, .. }
            | Self::File { correlation_id, .. }
            | Self::Kb { correlation_id, .. } => *correlation_id,
        }
    }

    pub fn retry_meta(&self) -> Option<&RetryMeta> {
        match self {
            Self::Chat { retry_meta, .. }
            | Self::File { retry_meta, .. }
            | Self::Kb { retry_meta, .. } => retry_meta.as_ref(),
        }
    }

    /// The topic name this envelope was originally submitted on (before any retry wrapping).
    pub fn original_topic(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::File { .. } => "file",
            Self::Kb { .. } => "kb",
        }
    }

    /// Build the next-attempt envelope carried on the retry topic.
    pub fn into_retry(self, error: impl Into<String>) -> Self {
        let original_topic = self.original_topic().to_string();
        let last_error = error.into();
        match self {
            Self::Chat {
                correlation_id,
                payload,
                retry_meta,
            } => Self::Chat {
                correlation_id,
                payload,
                retry_meta: Some(bump_retry_meta(retry_meta, last_error, original_topic)),
            },
            Self::File {
                correlation_id,
                payload,
                retry_meta,
            } => Self::File {
                correlation_id,
                payload,
                retry_meta: Some(bump_retry_meta(retry_meta, last_error, original_topic)),
            },
            Self::Kb {
                correlation_id,
                payload,
                retry_meta,
            } => Self::Kb {
                correlation_id,
                payload,
                retry_meta: Some(bump_retry_meta(retry_meta, last_error, original_topic)),
            },
        }
    }
}

fn bump_retry_meta(existing: Option<RetryMeta>, last_error: String, original_topic: String) -> RetryMeta {
    match existing {
        Some(meta) => RetryMeta {
            retry_count: meta.retry_count + 1,
            last_error,
            original_topic: meta.original_topic,
        },
        None => RetryMeta {
            retry_count: 1,
            last_error,
            original_topic,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let envelope = JobEnvelope::Chat {
            correlation_id: CorrelationId::new(),
            payload: ChatPayload {
                conversation_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                message: "hello".to_string(),
                generate_title: true,
            },
            retry_meta: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: JobEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn kb_delete_message_defaults_action_when_field_is_absent() {
        let json = serde_json::json!({
            "topic": "kb",
            "correlation_id": Uuid::new_v4(),
            "payload": { "file_id": Uuid::new_v4() },
            "retry_meta": null,
        });
        let envelope: JobEnvelope = serde_json::from_value(json).unwrap();
        let JobEnvelope::Kb { payload, .. } = envelope else {
            panic!("expected a kb envelope");
        };
        assert_eq!(payload.action, KbAction::Ingest);
        assert!(payload.file_path.is_none());
    }

    #[test]
    fn kb_delete_message_round_trips() {
        let envelope = JobEnvelope::Kb {
            correlation_id: CorrelationId::new(),
            payload: KbPayload {
                action: KbAction::Delete,
                file_id: Uuid::new_v4(),
                record_id: None,
                file_path: None,
                file_type: None,
                original_name: None,
            },
            retry_meta: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: JobEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn into_retry_increments_count_and_preserves_original_topic() {
        let envelope = JobEnvelope::File {
            correlation_id: CorrelationId::new(),
            payload: FilePayload {
                file_id: Uuid::new_v4(),
                file_path: "/tmp/a.pdf".to_string(),
                file_type: "pdf".to_string(),
                original_name: "a.pdf".to_string(),
                file_size: 1024,
                conversation_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                file_record_id: Uuid::new_v4(),
            },
            retry_meta: None,
        };
        let retried = envelope.clone().into_retry("connection reset");
        let meta = retried.retry_meta().unwrap();
        assert_eq!(meta.retry_count, 1);
        assert_eq!(meta.original_topic, "file");

        let retried_again = retried.into_retry("timeout");
        assert_eq!(retried_again.retry_meta().unwrap().retry_count, 2);
        assert_eq!(retried_again.retry_meta().unwrap().original_topic, "file");
    }
}
