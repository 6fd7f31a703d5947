//! Qdrant-backed `VectorStore`. Production implementation of the collaborator
//! trait `chatcore` declares and tests against with mocks.

use async_trait::async_trait;
use chatcore::{ChatCoreError, ChatCoreResult, VectorMatch, VectorPoint, VectorStore};
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use uuid::Uuid;

pub struct QdrantVectorStore {
    client: Qdrant,
    vector_size: u64,
}

impl QdrantVectorStore {
    pub fn new(client: Qdrant, vector_size: u64) -> Self {
        Self { client, vector_size }
    }

    fn qdrant_err(context: &str, e: impl std::fmt::Display) -> ChatCoreError {
        ChatCoreError::VectorStore(format!("{context}: {e}"))
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, collection: &str) -> ChatCoreResult<()> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| Self::qdrant_err("checking collection", e))?;
        if exists {
            return Ok(());
        }

        let request = CreateCollectionBuilder::new(collection)
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine));
        self.client
            .create_collection(request)
            .await
            .map_err(|e| Self::qdrant_err("creating collection", e))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> ChatCoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let structs: Vec<PointStruct> = points
            .into_iter()
            .map(|point| {
                let mut payload = HashMap::new();
                payload.insert("content".to_string(), point.content.into());
                payload.insert("chunk_index".to_string(), (point.chunk_index as i64).into());
                payload.insert("file_id".to_string(), point.file_id.to_string().into());
                payload.insert("metadata".to_string(), point.metadata.to_string().into());
                PointStruct::new(point.id.to_string(), point.vector, Payload::from(payload))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs))
            .await
            .map_err(|e| Self::qdrant_err("upserting points", e))?;
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> ChatCoreResult<Vec<VectorMatch>> {
        let response = self
            .client
            .search_points(SearchPointsBuilder::new(collection, vector.to_vec(), k as u64).with_payload(true))
            .await
            .map_err(|e| Self::qdrant_err("querying collection", e))?;

        let matches = response
            .result
            .into_iter()
            .map(|scored| {
                let content = scored
                    .payload
                    .get("content")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let file_name = scored
                    .payload
                    .get("metadata")
                    .and_then(|v| v.as_str())
                    .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                    .and_then(|json| json.get("original_name").or_else(|| json.get("file_name")).cloned())
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                VectorMatch {
                    content,
                    file_name,
                    distance: 1.0 - scored.score,
                }
            })
            .collect();
        Ok(matches)
    }

    async fn delete_by_file_id(&self, collection: &str, file_id: Uuid) -> ChatCoreResult<u64> {
        let filter = Filter::must([Condition::matches("file_id", file_id.to_string())]);
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter))
            .await
            .map_err(|e| Self::qdrant_err("deleting by file_id", e))?;
        // Qdrant's delete response carries an operation id/status, not a count of
        // matched points, so callers only learn that the delete was accepted.
        Ok(1)
    }
}
