//! Redis-backed storage for the two collections the gateway exclusively owns:
//! `conversations` and `ip_messages`. Grounded on `apps/orchestrator`'s
//! `RedisDocumentStore` for the key/hash/list conventions, kept separate from
//! `chatcore::DocumentStore` since that trait is scoped to handler-side reads
//! and writes, not gateway-side conversation bookkeeping.

use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct ConversationStore {
    conn: redis::aio::ConnectionManager,
}

impl ConversationStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    fn conversation_key(id: Uuid) -> String {
        format!("conversation:{id}:meta")
    }

    fn user_conversations_key(user_id: Uuid) -> String {
        format!("user:{user_id}:conversations")
    }

    fn ip_messages_key(ip: &str) -> String {
        format!("ip_messages:{ip}")
    }

    /// Look up a conversation by id, enforcing that it belongs to `user_id`.
    pub async fn find_owned(&self, conversation_id: Uuid, user_id: Uuid) -> redis::RedisResult<Option<Conversation>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::conversation_key(conversation_id)).await?;
        let Some(raw) = raw else { return Ok(None) };
        let conversation: Conversation = serde_json::from_str(&raw)
            .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "bad conversation json", e.to_string())))?;
        if conversation.user_id != user_id {
            return Ok(None);
        }
        Ok(Some(conversation))
    }

    /// Resolve an existing conversation or create a fresh one for `user_id`.
    pub async fn resolve_or_create(&self, conversation_id: Option<Uuid>, user_id: Uuid) -> redis::RedisResult<Conversation> {
        if let Some(id) = conversation_id {
            if let Some(existing) = self.find_owned(id, user_id).await? {
                return Ok(existing);
            }
        }

        let conversation = Conversation { id: Uuid::new_v4(), user_id, title: None };
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(&conversation)
            .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "encoding conversation", e.to_string())))?;
        conn.set::<_, _, ()>(Self::conversation_key(conversation.id), body).await?;
        conn.sadd::<_, _, ()>(Self::user_conversations_key(user_id), conversation.id.to_string()).await?;
        Ok(conversation)
    }

    /// Append the user's message in short display form to the conversation's history.
    pub async fn append_user_message(&self, conversation_id: Uuid, display_text: &str) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let entry = serde_json::json!({ "role": "user", "content": display_text });
        let body = serde_json::to_string(&entry)
            .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "encoding message", e.to_string())))?;
        let key = format!("conversation:{conversation_id}:history");
        conn.rpush::<_, _, ()>(&key, body).await?;
        conn.ltrim::<_, ()>(&key, -200, -1).await?;
        Ok(())
    }

    /// Record an audit row for this (ip, message) pair.
    pub async fn record_ip_message(&self, ip: &str, user_id: Uuid, conversation_id: Uuid) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let entry = serde_json::json!({
            "user_id": user_id,
            "conversation_id": conversation_id,
            "at": Utc::now().to_rfc3339(),
        });
        let body = serde_json::to_string(&entry)
            .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "encoding ip message", e.to_string())))?;
        conn.rpush::<_, _, ()>(Self::ip_messages_key(ip), body).await?;
        Ok(())
    }
}
