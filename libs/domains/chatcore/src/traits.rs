//! Collaborator traits the chat/file/kb handlers depend on, injected as
//! `Arc<dyn ...>` so the handlers stay testable without a live LLM, embedding
//! service, vector store, or document store.

use crate::error::ChatCoreResult;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>;

/// Abstraction over the chat model. Implementations translate `LlmRequest` into a
/// provider-specific call; `complete_streaming` yields incremental text chunks as
/// they arrive so the chat handler can write partial progress.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> ChatCoreResult<LlmCompletion>;

    async fn complete_streaming(&self, request: &LlmRequest) -> ChatCoreResult<TextChunkStream>;

    fn model_id(&self) -> &str;
}

/// Abstraction over the embedding model used for knowledge-base retrieval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> ChatCoreResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub content: String,
    pub chunk_index: usize,
    pub file_id: Uuid,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub content: String,
    pub file_name: String,
    pub distance: f32,
}

/// Abstraction over the vector store backing knowledge-base retrieval. One
/// collection per uploaded file (File Handler); one shared collection,
/// conventionally named `RagData`, for admin-curated knowledge-base documents
/// (KB Handler).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, collection: &str) -> ChatCoreResult<()>;

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> ChatCoreResult<()>;

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> ChatCoreResult<Vec<VectorMatch>>;

    async fn delete_by_file_id(&self, collection: &str, file_id: Uuid) -> ChatCoreResult<u64>;
}

#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Completed,
    Failed,
}

/// Abstraction over the document store (conversations, prompts, file/KB
/// records). Owns the `prompts`, `ragdata`-adjacent metadata, and
/// `files.$.chunk_count` concerns distinct from the vector store itself.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_prompt(&self, key: &str) -> ChatCoreResult<Option<String>>;

    async fn get_history(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> ChatCoreResult<Vec<ConversationMessage>>;

    async fn append_assistant_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> ChatCoreResult<()>;

    async fn set_conversation_title(&self, conversation_id: Uuid, title: &str) -> ChatCoreResult<()>;

    async fn update_file_status(
        &self,
        file_record_id: Uuid,
        status: ProcessingStatus,
        chunk_count: usize,
        collection_name: Option<&str>,
    ) -> ChatCoreResult<()>;

    async fn update_kb_status(
        &self,
        record_id: Uuid,
        status: ProcessingStatus,
        chunk_count: usize,
    ) -> ChatCoreResult<()>;
}
