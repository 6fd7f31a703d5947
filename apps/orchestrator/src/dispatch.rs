//! Fans a `JobEnvelope` out to the chat/file/kb handler that owns its topic.

use async_trait::async_trait;
use chatcore::{ChatHandler, FileHandler, KbHandler};
use job_queue::envelope::JobEnvelope;
use job_queue::registry::{JobHandler, JobOutcome};
use std::sync::Arc;

pub struct DispatchHandler {
    chat: Arc<ChatHandler>,
    file: Arc<FileHandler>,
    kb: Arc<KbHandler>,
}

impl DispatchHandler {
    pub fn new(chat: Arc<ChatHandler>, file: Arc<FileHandler>, kb: Arc<KbHandler>) -> Self {
        Self { chat, file, kb }
    }
}

#[async_trait]
impl JobHandler for DispatchHandler {
    async fn handle(&self, envelope: &JobEnvelope) -> Result<JobOutcome, String> {
        match envelope {
            JobEnvelope::Chat { .. } => self.chat.handle(envelope).await,
            JobEnvelope::File { .. } => self.file.handle(envelope).await,
            JobEnvelope::Kb { .. } => self.kb.handle(envelope).await,
        }
    }

    fn name(&self) -> &'static str {
        "dispatch"
    }
}
