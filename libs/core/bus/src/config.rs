//! Secondary-bus configuration: stream/subject names and consumer tuning.

use core_config::{env_or_default, env_required, ConfigError, FromEnv};

/// Connection and topology settings for the secondary (analytics) bus.
///
/// The secondary bus carries lifecycle events fired by handlers — `llm.calls`,
/// `file.processing`, `chatbot.events` — to the analytics consumer. It is
/// distinct from the primary job queue, which lives in `job_queue`.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub nats_url: String,
    pub stream_name: String,
    pub llm_calls_subject: String,
    pub file_processing_subject: String,
    pub chatbot_events_subject: String,
    pub consumer_durable_name: String,
    pub ack_wait_secs: u64,
    pub max_deliver: i64,
    pub batch_size: usize,
}

impl BusConfig {
    /// All subjects the stream must capture, in the order declared.
    pub fn subjects(&self) -> Vec<String> {
        vec![
            self.llm_calls_subject.clone(),
            self.file_processing_subject.clone(),
            self.chatbot_events_subject.clone(),
        ]
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            stream_name: "CHATBOT_EVENTS".to_string(),
            llm_calls_subject: "llm.calls".to_string(),
            file_processing_subject: "file.processing".to_string(),
            chatbot_events_subject: "chatbot.events".to_string(),
            consumer_durable_name: "analytics-consumer".to_string(),
            ack_wait_secs: 30,
            max_deliver: 5,
            batch_size: 50,
        }
    }
}

impl FromEnv for BusConfig {
    /// `NATS_URL` is required; everything else falls back to sane defaults so a
    /// single orchestrator or analytics-worker deployment needs no further tuning.
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            nats_url: env_required("NATS_URL")?,
            stream_name: env_or_default("BUS_STREAM_NAME", &defaults.stream_name),
            llm_calls_subject: env_or_default("BUS_LLM_CALLS_SUBJECT", &defaults.llm_calls_subject),
            file_processing_subject: env_or_default(
                "BUS_FILE_PROCESSING_SUBJECT",
                &defaults.file_processing_subject,
            ),
            chatbot_events_subject: env_or_default(
                "BUS_CHATBOT_EVENTS_SUBJECT",
                &defaults.chatbot_events_subject,
            ),
            consumer_durable_name: env_or_default(
                "BUS_CONSUMER_DURABLE_NAME",
                &defaults.consumer_durable_name,
            ),
            ack_wait_secs: env_or_default("BUS_ACK_WAIT_SECS", &defaults.ack_wait_secs.to_string())
                .parse()
                .map_err(|e| ConfigError::ParseError {
                    key: "BUS_ACK_WAIT_SECS".to_string(),
                    details: format!("{e}"),
                })?,
            max_deliver: env_or_default("BUS_MAX_DELIVER", &defaults.max_deliver.to_string())
                .parse()
                .map_err(|e| ConfigError::ParseError {
                    key: "BUS_MAX_DELIVER".to_string(),
                    details: format!("{e}"),
                })?,
            batch_size: env_or_default("BUS_BATCH_SIZE", &defaults.batch_size.to_string())
                .parse()
                .map_err(|e| ConfigError::ParseError {
                    key: "BUS_BATCH_SIZE".to_string(),
                    details: format!("{e}"),
                })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subjects_match_secondary_bus_topics() {
        let config = BusConfig::default();
        assert_eq!(
            config.subjects(),
            vec!["llm.calls", "file.processing", "chatbot.events"]
        );
    }

    #[test]
    fn from_env_requires_nats_url() {
        temp_env::with_var_unset("NATS_URL", || {
            assert!(BusConfig::from_env().is_err());
        });
    }

    #[test]
    fn from_env_uses_defaults_for_everything_else() {
        temp_env::with_var("NATS_URL", Some("nats://bus:4222"), || {
            let config = BusConfig::from_env().unwrap();
            assert_eq!(config.nats_url, "nats://bus:4222");
            assert_eq!(config.stream_name, "CHATBOT_EVENTS");
            assert_eq!(config.max_deliver, 5);
        });
    }
}
