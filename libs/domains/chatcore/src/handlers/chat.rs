//! Chat Handler (C5): prompt-injection scanning, sanitization, history assembly
//! under a token budget, knowledge-base retrieval, streamed LLM completion, and
//! leak detection, wired together per-message.

use crate::analytics::{self, ConversationEvent, LlmResponseEvent};
use crate::error::{ChatCoreError, ChatCoreResult};
use crate::handlers::kb::RAG_COLLECTION;
use crate::prompts::{format_rag_prompt, load_prompts};
use crate::security::{detect_system_prompt_leak, mask_pii, sanitize_input, scan_for_injection, segregate_file_content};
use crate::tokens::{assemble_budgeted_messages, estimate_tokens, HistoryEntry, TokenBudget};
use crate::traits::{
    ConversationMessage, DocumentStore, EmbeddingModel, LlmMessage, LlmProvider, LlmRequest, Role,
    VectorStore,
};
use chrono::Utc;
use job_queue::envelope::{ChatPayload, CorrelationId};
use job_queue::{JobHandler, JobOutcome};
use job_queue::result_channel::{JobType, ProgressRecord, ResultChannel};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::warn;

/// How many streamed chunks accumulate before a progress write is flushed.
const STREAM_FLUSH_EVERY: usize = 10;
/// `k` for the knowledge-base nearest-neighbor query.
const RETRIEVAL_K: usize = 5;
/// Chunks with a distance at or above this are considered irrelevant.
const RETRIEVAL_DISTANCE_THRESHOLD: f32 = 1.0;
/// Character budget for the joined retrieved context, expressed in tokens.
const RAG_CONTEXT_TOKEN_BUDGET: usize = 1500;
/// Characters of user text considered for embedding and title generation.
const RETRIEVAL_QUERY_CHARS: usize = 500;
const TITLE_SOURCE_CHARS: usize = 150;
const TITLE_MAX_CHARS: usize = 50;

pub struct ChatHandler {
    llm: Arc<dyn LlmProvider>,
    embeddings: Arc<dyn EmbeddingModel>,
    vectors: Arc<dyn VectorStore>,
    documents: Arc<dyn DocumentStore>,
    results: ResultChannel,
    budget: TokenBudget,
}

impl ChatHandler {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embeddings: Arc<dyn EmbeddingModel>,
        vectors: Arc<dyn VectorStore>,
        documents: Arc<dyn DocumentStore>,
        results: ResultChannel,
    ) -> Self {
        Self {
            llm,
            embeddings,
            vectors,
            documents,
            results,
            budget: TokenBudget::default(),
        }
    }

    async fn process(
        &self,
        correlation_id: CorrelationId,
        payload: &ChatPayload,
    ) -> ChatCoreResult<JobOutcome> {
        let start = std::time::Instant::now();

        // 1-3: scan, sanitize, segregate.
        if scan_for_injection(&payload.message) {
            warn!(%correlation_id, "prompt-injection pattern matched in chat message");
        }
        let sanitized = sanitize_input(&payload.message);
        let segregated = segregate_file_content(&sanitized);

        // 4: PII masking, analytics-only.
        let (masked_user_text, _pii_counts) = mask_pii(&segregated.user_text);
        let masked_preview: String = masked_user_text.chars().take(200).collect();

        // 5: prompt loading.
        let prompts = load_prompts(self.documents.as_ref()).await?;
        let mut system_prompt = prompts.system_prompt.clone();

        // 6 (partial): fetch history, leave budget assembly until after retrieval
        // rewrites the system prompt, since the system prompt is counted in budget.
        let history = self
            .documents
            .get_history(payload.conversation_id, self.budget.max_history_messages)
            .await?;
        let history_entries: Vec<HistoryEntry> = history.into_iter().map(Into::into).collect();

        // 7: knowledge-base retrieval over the user-text portion only.
        let retrieval_query: String = segregated.user_text.chars().take(RETRIEVAL_QUERY_CHARS).collect();
        let rag_used = if !retrieval_query.trim().is_empty() {
            let embeddings = self.embeddings.embed_batch(&[retrieval_query]).await?;
            let query_vector = embeddings.into_iter().next().unwrap_or_default();
            let matches = self
                .vectors
                .query(RAG_COLLECTION, &query_vector, RETRIEVAL_K)
                .await?;
            let relevant: Vec<_> = matches
                .into_iter()
                .filter(|m| m.distance < RETRIEVAL_DISTANCE_THRESHOLD)
                .collect();

            if relevant.is_empty() {
                false
            } else {
                let mut context = String::new();
                for chunk in &relevant {
                    context.push_str(&format!("[Knowledge Base: {}]\n{}\n\n", chunk.file_name, chunk.content));
                }
                let truncated_context = truncate_context_to_tokens(&context, RAG_CONTEXT_TOKEN_BUDGET);
                system_prompt = format_rag_prompt(&prompts.rag_prompt_template, &truncated_context);
                true
            }
        } else {
            false
        };

        // 6: assemble the budgeted message list now that the system prompt is final.
        let system_tokens = estimate_tokens(&system_prompt);
        let budgeted = assemble_budgeted_messages(
            &self.budget,
            system_tokens,
            &segregated.user_text,
            segregated.file_text.as_deref(),
            &history_entries,
        );

        let messages: Vec<LlmMessage> = budgeted
            .into_iter()
            .map(|m| LlmMessage {
                role: role_from_str(m.role),
                content: m.content,
            })
            .collect();

        // 8: initial progress write before the stream starts.
        self.results
            .write(correlation_id, &ProgressRecord::processing(JobType::Chat))
            .await
            .map_err(|e| ChatCoreError::ResultChannel(e.to_string()))?;

        // 9: streaming call, flushing progress every STREAM_FLUSH_EVERY chunks.
        let request = LlmRequest {
            system_prompt: system_prompt.clone(),
            messages,
            max_tokens: 1500,
            temperature: None,
        };
        let mut stream = self.llm.complete_streaming(&request).await?;
        let mut accumulated = String::new();
        let mut since_flush = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ChatCoreError::Llm)?;
            accumulated.push_str(&chunk);
            since_flush += 1;
            if since_flush >= STREAM_FLUSH_EVERY {
                since_flush = 0;
                let record = ProgressRecord::processing(JobType::Chat).with_streamed_chunk(&accumulated);
                let _ = self.results.write(correlation_id, &record).await;
            }
        }

        // 10: leak detection, logged only.
        if detect_system_prompt_leak(&system_prompt, &accumulated) {
            warn!(%correlation_id, "response may be leaking the system prompt");
        }

        // 11: title generation.
        let title = if payload.generate_title {
            Some(self.generate_title(&segregated.user_text).await?)
        } else {
            None
        };

        // 12: persist the assistant message and title.
        self.documents
            .append_assistant_message(payload.conversation_id, &accumulated)
            .await?;
        if let Some(title) = &title {
            self.documents
                .set_conversation_title(payload.conversation_id, title)
                .await?;
            analytics::emit_conversation_event(ConversationEvent {
                event_type: "CONVERSATION_TITLED".to_string(),
                timestamp: Utc::now(),
                conversation_id: payload.conversation_id,
                user_id: payload.user_id,
                detail: serde_json::json!({ "title": title }),
            })
            .await;
        }

        // 13: emit LLM_RESPONSE event.
        analytics::emit_llm_event(LlmResponseEvent {
            event_type: "LLM_RESPONSE".to_string(),
            timestamp: Utc::now(),
            correlation_id: correlation_id.0,
            conversation_id: payload.conversation_id,
            user_id: payload.user_id,
            model: self.llm.model_id().to_string(),
            message_preview: masked_preview,
            latency_ms: start.elapsed().as_millis() as u64,
            prompt_tokens: system_tokens as u32,
            completion_tokens: estimate_tokens(&accumulated) as u32,
            success: true,
            rag_used,
        })
        .await;

        // 14: return.
        let mut outcome = JobOutcome::new(accumulated);
        if let Some(title) = title {
            outcome = outcome.with_title(title);
        }
        Ok(outcome)
    }

    async fn generate_title(&self, user_text: &str) -> ChatCoreResult<String> {
        let source: String = user_text.chars().take(TITLE_SOURCE_CHARS).collect();
        let request = LlmRequest {
            system_prompt: "Generate a short, plain title for this conversation. Respond with the title only, no quotes.".to_string(),
            messages: vec![LlmMessage {
                role: Role::User,
                content: source,
            }],
            max_tokens: 20,
            temperature: Some(0.3),
        };
        let completion = self.llm.complete(&request).await?;
        let trimmed = completion.text.trim().trim_matches(|c| c == '"' || c == '\'');
        let title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        Ok(title)
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn role_from_str(role: &str) -> Role {
    match role {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        _ => Role::User,
    }
}

fn truncate_context_to_tokens(context: &str, max_tokens: usize) -> String {
    if estimate_tokens(context) <= max_tokens {
        return context.to_string();
    }
    let max_chars = max_tokens.saturating_sub(1).saturating_mul(4);
    context.chars().take(max_chars).collect()
}

impl From<ConversationMessage> for HistoryEntry {
    fn from(message: ConversationMessage) -> Self {
        HistoryEntry {
            role: role_str(message.role),
            content: message.content,
        }
    }
}

/// Errors whose message contains `rate_limit` or `413` are re-raised with a
/// friendlier prefix; the retry policy's substring classifier still matches them
/// (it checks for `rate_limit` and `429`/`413`-adjacent substrings), so they remain
/// retryable after this wrapping.
fn friendly_error(err: ChatCoreError) -> String {
    let raw = err.to_string();
    let lower = raw.to_lowercase();
    if lower.contains("rate_limit") || lower.contains("413") {
        format!("The assistant is receiving too many requests right now: {raw}")
    } else {
        raw
    }
}

#[async_trait::async_trait]
impl JobHandler for ChatHandler {
    async fn handle(
        &self,
        envelope: &job_queue::envelope::JobEnvelope,
    ) -> Result<JobOutcome, String> {
        let job_queue::envelope::JobEnvelope::Chat {
            correlation_id,
            payload,
            ..
        } = envelope
        else {
            return Err("chat handler received a non-chat envelope".to_string());
        };

        self.process(*correlation_id, payload)
            .await
            .map_err(friendly_error)
    }

    fn name(&self) -> &'static str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockDocumentStore, MockEmbeddingModel, MockLlmProvider, MockVectorStore, TextChunkStream};
    use job_queue::envelope::{CorrelationId, JobEnvelope};
    use test_utils::TestRedis;

    #[test]
    fn friendly_error_prefixes_rate_limit_messages() {
        let err = ChatCoreError::Llm("rate_limit exceeded, try later".to_string());
        let msg = friendly_error(err);
        assert!(msg.starts_with("The assistant is receiving too many requests"));
    }

    #[test]
    fn friendly_error_leaves_other_errors_untouched() {
        let err = ChatCoreError::Llm("invalid request".to_string());
        assert_eq!(friendly_error(err), "LLM call failed: invalid request");
    }

    #[test]
    fn title_generation_strips_quotes_and_truncates() {
        let raw = format!("\"{}\"", "a".repeat(80));
        let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        let title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        assert_eq!(title.len(), TITLE_MAX_CHARS);
        assert!(!title.contains('"'));
    }

    async fn result_channel(redis: &TestRedis) -> ResultChannel {
        let client = redis::Client::open(redis.connection_string().to_string()).unwrap();
        let manager = client.get_connection_manager().await.unwrap();
        ResultChannel::new(manager)
    }

    #[tokio::test]
    async fn handles_a_plain_message_with_no_retrieval_hits() {
        let redis = TestRedis::new().await;

        let mut llm = MockLlmProvider::new();
        llm.expect_complete_streaming().returning(|_| {
            let chunks = vec![Ok("Hello".to_string()), Ok(" there!".to_string())];
            Ok(Box::pin(tokio_stream::iter(chunks)) as TextChunkStream)
        });
        llm.expect_model_id().return_const("test-model".to_string());

        let mut embeddings = MockEmbeddingModel::new();
        embeddings
            .expect_embed_batch()
            .returning(|_| Ok(vec![vec![0.1, 0.2, 0.3]]));

        let mut vectors = MockVectorStore::new();
        vectors.expect_query().returning(|_, _, _| Ok(Vec::new()));

        let mut documents = MockDocumentStore::new();
        documents.expect_get_prompt().returning(|_| Ok(None));
        documents.expect_get_history().returning(|_, _| Ok(Vec::new()));
        documents
            .expect_append_assistant_message()
            .returning(|_, _| Ok(()));

        let handler = ChatHandler::new(
            Arc::new(llm),
            Arc::new(embeddings),
            Arc::new(vectors),
            Arc::new(documents),
            result_channel(&redis).await,
        );

        let envelope = JobEnvelope::Chat {
            correlation_id: CorrelationId::new(),
            payload: ChatPayload {
                conversation_id: uuid::Uuid::new_v4(),
                user_id: uuid::Uuid::new_v4(),
                message: "How's the weather today?".to_string(),
                generate_title: false,
            },
            retry_meta: None,
        };

        let outcome = handler.handle(&envelope).await.unwrap();
        assert_eq!(outcome.reply, "Hello there!");
        assert!(outcome.title.is_none());
    }
}
