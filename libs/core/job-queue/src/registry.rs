//! The `JobHandler` trait: how a worker pool turns a `JobEnvelope` into a result.

use crate::envelope::JobEnvelope;
use async_trait::async_trait;

/// The outcome of handling one job, written to the result channel by the worker pool.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub reply: String,
    pub title: Option<String>,
}

impl JobOutcome {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Implemented by the chat/file/kb handlers in `chatcore`. The worker pool is
/// generic over this trait: it owns retry classification, DLQ routing, and
/// result-channel writes, and defers only the domain logic to `handle`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, envelope: &JobEnvelope) -> Result<JobOutcome, String>;

    /// Processor name, used in logs and metrics.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ChatPayload, CorrelationId};
    use uuid::Uuid;

    struct EchoHandler;

    #[async_trait]
    impl JobHandler for EchoHandler {
        async fn handle(&self, envelope: &JobEnvelope) -> Result<JobOutcome, String> {
            match envelope {
                JobEnvelope::Chat { payload, .. } => Ok(JobOutcome::new(payload.message.clone())),
                _ => Err("unsupported".to_string()),
            }
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn handler_echoes_chat_message() {
        let handler = EchoHandler;
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
        let outcome = handler.handle(&envelope).await.unwrap();
        assert_eq!(outcome.reply, "hi");
    }
}
