//! Knowledge-Base Handler (C5): sentence-boundary chunking of admin-curated
//! documents into the shared `RagData` collection, plus the delete-by-`file_id`
//! path used when an admin removes a document.

use crate::chunking::chunk_by_sentence;
use crate::error::{ChatCoreError, ChatCoreResult};
use crate::handlers::file::TextExtractor;
use crate::traits::{DocumentStore, EmbeddingModel, ProcessingStatus, VectorPoint, VectorStore};
use job_queue::envelope::{JobEnvelope, KbAction, KbPayload};
use job_queue::{JobHandler, JobOutcome};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_CHUNK_CHARS: usize = 1000;
pub const RAG_COLLECTION: &str = "RagData";

pub struct KbHandler {
    extractor: Arc<dyn TextExtractor>,
    embeddings: Arc<dyn EmbeddingModel>,
    vectors: Arc<dyn VectorStore>,
    documents: Arc<dyn DocumentStore>,
}

impl KbHandler {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embeddings: Arc<dyn EmbeddingModel>,
        vectors: Arc<dyn VectorStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            extractor,
            embeddings,
            vectors,
            documents,
        }
    }

    async fn process(&self, payload: &KbPayload) -> ChatCoreResult<JobOutcome> {
        match payload.action {
            KbAction::Delete => self.delete(payload.file_id).await,
            KbAction::Ingest => self.ingest(payload).await,
        }
    }

    async fn delete(&self, file_id: Uuid) -> ChatCoreResult<JobOutcome> {
        let deleted = self.vectors.delete_by_file_id(RAG_COLLECTION, file_id).await?;
        info!(%file_id, deleted, "deleted knowledge-base chunks");
        Ok(JobOutcome::new(json!({ "deleted": deleted }).to_string()))
    }

    async fn ingest(&self, payload: &KbPayload) -> ChatCoreResult<JobOutcome> {
        let file_path = payload
            .file_path
            .as_deref()
            .ok_or_else(|| ChatCoreError::DocumentStore("kb ingest message missing file_path".to_string()))?;
        let file_type = payload
            .file_type
            .as_deref()
            .ok_or_else(|| ChatCoreError::DocumentStore("kb ingest message missing file_type".to_string()))?;
        let record_id = payload
            .record_id
            .ok_or_else(|| ChatCoreError::DocumentStore("kb ingest message missing record_id".to_string()))?;
        let original_name = payload.original_name.clone().unwrap_or_default();

        let extracted = self.extractor.extract(file_path, file_type)?;
        if extracted.text.trim().is_empty() {
            return Err(ChatCoreError::EmptyDocument);
        }

        let chunks = chunk_by_sentence(&extracted.text, MAX_CHUNK_CHARS);
        self.vectors.ensure_collection(RAG_COLLECTION).await?;
        let vectors = self.embeddings.embed_batch(&chunks).await?;

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors.into_iter())
            .enumerate()
            .map(|(index, (content, vector))| VectorPoint {
                id: Uuid::new_v4(),
                vector,
                content: content.clone(),
                chunk_index: index,
                file_id: payload.file_id,
                metadata: json!({ "file_name": original_name }),
            })
            .collect();

        self.vectors.upsert(RAG_COLLECTION, points).await?;
        self.documents
            .update_kb_status(record_id, ProcessingStatus::Completed, chunks.len())
            .await?;

        let result = json!({
            "chunk_count": chunks.len(),
            "original_name": original_name,
        });
        Ok(JobOutcome::new(result.to_string()))
    }
}

#[async_trait::async_trait]
impl JobHandler for KbHandler {
    async fn handle(&self, envelope: &JobEnvelope) -> Result<JobOutcome, String> {
        let JobEnvelope::Kb { payload, .. } = envelope else {
            return Err("kb handler received a non-kb envelope".to_string());
        };
        self.process(payload).await.map_err(|e| e.to_string())
    }

    fn name(&self) -> &'static str {
        "kb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::file::ExtractedText;
    use crate::traits::{MockDocumentStore, MockEmbeddingModel, MockVectorStore};
    use job_queue::envelope::CorrelationId;

    struct StubExtractor(&'static str);

    impl TextExtractor for StubExtractor {
        fn extract(&self, _file_path: &str, _file_type: &str) -> ChatCoreResult<ExtractedText> {
            Ok(ExtractedText {
                text: self.0.to_string(),
                preview_table: None,
            })
        }
    }

    fn ingest_payload() -> KbPayload {
        KbPayload {
            action: KbAction::Ingest,
            file_id: Uuid::new_v4(),
            record_id: Some(Uuid::new_v4()),
            file_path: Some("/tmp/handbook.pdf".to_string()),
            file_type: Some("pdf".to_string()),
            original_name: Some("handbook.pdf".to_string()),
        }
    }

    #[tokio::test]
    async fn delete_calls_vector_store_and_reports_count() {
        let mut vectors = MockVectorStore::new();
        vectors.expect_delete_by_file_id().returning(|_, _| Ok(7));

        let handler = KbHandler::new(
            Arc::new(StubExtractor("")),
            Arc::new(MockEmbeddingModel::new()),
            Arc::new(vectors),
            Arc::new(MockDocumentStore::new()),
        );

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

        let outcome = handler.handle(&envelope).await.unwrap();
        assert!(outcome.reply.contains("\"deleted\":7"));
    }

    #[tokio::test]
    async fn ingest_rejects_missing_file_path() {
        let mut payload = ingest_payload();
        payload.file_path = None;

        let handler = KbHandler::new(
            Arc::new(StubExtractor("text")),
            Arc::new(MockEmbeddingModel::new()),
            Arc::new(MockVectorStore::new()),
            Arc::new(MockDocumentStore::new()),
        );

        let err = handler.process(&payload).await.unwrap_err();
        assert!(matches!(err, ChatCoreError::DocumentStore(_)));
    }

    #[tokio::test]
    async fn ingest_chunks_and_indexes_into_shared_collection() {
        let mut embeddings = MockEmbeddingModel::new();
        embeddings
            .expect_embed_batch()
            .returning(|texts| Ok(texts.iter().map(|_| vec![0.1]).collect()));

        let mut vectors = MockVectorStore::new();
        vectors
            .expect_ensure_collection()
            .withf(|name| name == RAG_COLLECTION)
            .returning(|_| Ok(()));
        vectors
            .expect_upsert()
            .withf(|collection, _| collection == RAG_COLLECTION)
            .returning(|_, _| Ok(()));

        let mut documents = MockDocumentStore::new();
        documents.expect_update_kb_status().returning(|_, _, _| Ok(()));

        let handler = KbHandler::new(
            Arc::new(StubExtractor("One sentence. Another sentence.")),
            Arc::new(embeddings),
            Arc::new(vectors),
            Arc::new(documents),
        );

        let outcome = handler.process(&ingest_payload()).await.unwrap();
        assert!(outcome.reply.contains("chunk_count"));
    }
}
