//! Redis-backed `DocumentStore`. Conversation history is a capped list keyed
//! per conversation; prompts, file status, and KB status are simple hashes.
//! A schemaless document store (Mongo, Postgres+JSONB) is the natural home
//! for this in production; Redis is the workspace's only available backing
//! store, and every operation here is expressible as plain key/hash/list ops.

use async_trait::async_trait;
use chatcore::{ChatCoreError, ChatCoreResult, ConversationMessage, DocumentStore, ProcessingStatus, Role};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_HISTORY_PER_CONVERSATION: isize = 200;

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    role: String,
    content: String,
}

impl From<ConversationMessage> for StoredMessage {
    fn from(m: ConversationMessage) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role: role.to_string(),
            content: m.content,
        }
    }
}

impl StoredMessage {
    fn into_conversation_message(self) -> ConversationMessage {
        let role = match self.role.as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        };
        ConversationMessage {
            role,
            content: self.content,
        }
    }
}

pub struct RedisDocumentStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisDocumentStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    fn prompt_key(key: &str) -> String {
        format!("prompt:{key}")
    }

    fn history_key(conversation_id: Uuid) -> String {
        format!("conversation:{conversation_id}:history")
    }

    fn title_key(conversation_id: Uuid) -> String {
        format!("conversation:{conversation_id}:title")
    }

    fn file_status_key(file_record_id: Uuid) -> String {
        format!("file:{file_record_id}:status")
    }

    fn kb_status_key(record_id: Uuid) -> String {
        format!("kb:{record_id}:status")
    }

    fn store_err(context: &str, e: impl std::fmt::Display) -> ChatCoreError {
        ChatCoreError::DocumentStore(format!("{context}: {e}"))
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get_prompt(&self, key: &str) -> ChatCoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(Self::prompt_key(key))
            .await
            .map_err(|e| Self::store_err("get_prompt", e))
    }

    async fn get_history(&self, conversation_id: Uuid, limit: usize) -> ChatCoreResult<Vec<ConversationMessage>> {
        let mut conn = self.conn.clone();
        let start = -(limit as isize);
        let raw: Vec<String> = conn
            .lrange(Self::history_key(conversation_id), start, -1)
            .await
            .map_err(|e| Self::store_err("get_history", e))?;

        raw.into_iter()
            .map(|entry| {
                serde_json::from_str::<StoredMessage>(&entry)
                    .map(StoredMessage::into_conversation_message)
                    .map_err(|e| Self::store_err("decoding history entry", e))
            })
            .collect()
    }

    async fn append_assistant_message(&self, conversation_id: Uuid, content: &str) -> ChatCoreResult<()> {
        let mut conn = self.conn.clone();
        let entry = StoredMessage {
            role: "assistant".to_string(),
            content: content.to_string(),
        };
        let body = serde_json::to_string(&entry).map_err(|e| Self::store_err("encoding message", e))?;
        let key = Self::history_key(conversation_id);
        conn.rpush::<_, _, ()>(&key, body)
            .await
            .map_err(|e| Self::store_err("append_assistant_message", e))?;
        conn.ltrim::<_, ()>(&key, -MAX_HISTORY_PER_CONVERSATION, -1)
            .await
            .map_err(|e| Self::store_err("trimming history", e))?;
        Ok(())
    }

    async fn set_conversation_title(&self, conversation_id: Uuid, title: &str) -> ChatCoreResult<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::title_key(conversation_id), title)
            .await
            .map_err(|e| Self::store_err("set_conversation_title", e))
    }

    async fn update_file_status(
        &self,
        file_record_id: Uuid,
        status: ProcessingStatus,
        chunk_count: usize,
        collection_name: Option<&str>,
    ) -> ChatCoreResult<()> {
        let mut conn = self.conn.clone();
        let status_str = match status {
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        let fields: Vec<(&str, String)> = vec![
            ("status", status_str.to_string()),
            ("chunk_count", chunk_count.to_string()),
            ("collection_name", collection_name.unwrap_or_default().to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(Self::file_status_key(file_record_id), &fields)
            .await
            .map_err(|e| Self::store_err("update_file_status", e))
    }

    async fn update_kb_status(&self, record_id: Uuid, status: ProcessingStatus, chunk_count: usize) -> ChatCoreResult<()> {
        let mut conn = self.conn.clone();
        let status_str = match status {
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        };
        let fields: Vec<(&str, String)> = vec![
            ("status", status_str.to_string()),
            ("chunk_count", chunk_count.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(Self::kb_status_key(record_id), &fields)
            .await
            .map_err(|e| Self::store_err("update_kb_status", e))
    }
}
