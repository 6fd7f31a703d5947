//! File Handler (C5): extract, chunk, embed, and index an uploaded file into its
//! own per-file vector-store collection.

use crate::analytics::{self, FileProcessedEvent};
use crate::chunking::chunk_with_overlap;
use crate::collections::file_collection_name;
use crate::error::{ChatCoreError, ChatCoreResult};
use crate::traits::{DocumentStore, EmbeddingModel, ProcessingStatus, VectorPoint, VectorStore};
use chrono::Utc;
use job_queue::envelope::{CorrelationId, FilePayload, JobEnvelope};
use job_queue::{JobHandler, JobOutcome};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const CHUNK_TARGET_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;
const COLLECTION_TAG: &str = "file";
const PREVIEW_ROWS: usize = 10;

/// Extracts text (and, for tabular types, a markdown preview) from a raw file body.
/// Implemented per `file_type` by the binary wiring this handler up; kept out of
/// `chatcore` itself since it's pure I/O format parsing, not job orchestration.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, file_path: &str, file_type: &str) -> ChatCoreResult<ExtractedText>;
}

pub struct ExtractedText {
    pub text: String,
    /// Markdown preview of the first `PREVIEW_ROWS` rows, for tabular file types.
    pub preview_table: Option<String>,
}

pub struct FileHandler {
    extractor: Arc<dyn TextExtractor>,
    embeddings: Arc<dyn EmbeddingModel>,
    vectors: Arc<dyn VectorStore>,
    documents: Arc<dyn DocumentStore>,
}

impl FileHandler {
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

    async fn process(&self, correlation_id: CorrelationId, payload: &FilePayload) -> ChatCoreResult<JobOutcome> {
        let start = std::time::Instant::now();

        let extracted = self.extractor.extract(&payload.file_path, &payload.file_type)?;
        if extracted.text.trim().is_empty() {
            return Err(ChatCoreError::EmptyDocument);
        }

        let chunks = chunk_with_overlap(&extracted.text, CHUNK_TARGET_SIZE, CHUNK_OVERLAP);
        let collection_name = file_collection_name(COLLECTION_TAG, payload.file_id);

        self.vectors.ensure_collection(&collection_name).await?;
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
                metadata: json!({
                    "original_name": payload.original_name,
                    "file_type": payload.file_type,
                }),
            })
            .collect();

        self.vectors.upsert(&collection_name, points).await?;

        self.documents
            .update_file_status(
                payload.file_record_id,
                ProcessingStatus::Completed,
                chunks.len(),
                Some(&collection_name),
            )
            .await?;

        analytics::emit_file_event(FileProcessedEvent {
            event_type: "FILE_PROCESSED".to_string(),
            timestamp: Utc::now(),
            correlation_id: correlation_id.0,
            file_id: payload.file_id,
            user_id: payload.user_id,
            file_size: payload.file_size,
            chunk_count: chunks.len(),
            latency_ms: start.elapsed().as_millis() as u64,
            success: true,
        })
        .await;

        let result = json!({
            "chunk_count": chunks.len(),
            "collection_name": collection_name,
            "preview_table": extracted.preview_table,
        });
        Ok(JobOutcome::new(result.to_string()))
    }
}

#[async_trait::async_trait]
impl JobHandler for FileHandler {
    async fn handle(&self, envelope: &JobEnvelope) -> Result<JobOutcome, String> {
        let JobEnvelope::File {
            correlation_id,
            payload,
            ..
        } = envelope
        else {
            return Err("file handler received a non-file envelope".to_string());
        };
        self.process(*correlation_id, payload).await.map_err(|e| e.to_string())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Truncates `rows` to the first `PREVIEW_ROWS` and renders a markdown table, used
/// by tabular `TextExtractor` implementations (csv/xlsx) to build `preview_table`.
pub fn markdown_preview(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str("| ");
    out.push_str(&header.join(" | "));
    out.push_str(" |\n|");
    out.push_str(&"---|".repeat(header.len()));
    out.push('\n');
    for row in rows.iter().take(PREVIEW_ROWS) {
        out.push_str("| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockDocumentStore, MockEmbeddingModel, MockVectorStore};

    struct StubExtractor(&'static str);

    impl TextExtractor for StubExtractor {
        fn extract(&self, _file_path: &str, _file_type: &str) -> ChatCoreResult<ExtractedText> {
            Ok(ExtractedText {
                text: self.0.to_string(),
                preview_table: None,
            })
        }
    }

    fn sample_payload() -> FilePayload {
        FilePayload {
            file_id: Uuid::new_v4(),
            file_path: "/tmp/report.txt".to_string(),
            file_type: "txt".to_string(),
            original_name: "report.txt".to_string(),
            file_size: 4096,
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            file_record_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_extracted_text() {
        let mut vectors = MockVectorStore::new();
        vectors.expect_ensure_collection().never();

        let handler = FileHandler::new(
            Arc::new(StubExtractor("   \n  ")),
            Arc::new(MockEmbeddingModel::new()),
            Arc::new(vectors),
            Arc::new(MockDocumentStore::new()),
        );

        let err = handler.process(CorrelationId::new(), &sample_payload()).await.unwrap_err();
        assert!(matches!(err, ChatCoreError::EmptyDocument));
    }

    #[tokio::test]
    async fn processes_and_indexes_chunks() {
        let mut embeddings = MockEmbeddingModel::new();
        embeddings
            .expect_embed_batch()
            .returning(|texts| Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect()));

        let mut vectors = MockVectorStore::new();
        vectors.expect_ensure_collection().returning(|_| Ok(()));
        vectors.expect_upsert().returning(|_, _| Ok(()));

        let mut documents = MockDocumentStore::new();
        documents
            .expect_update_file_status()
            .withf(|_, status, chunk_count, collection| {
                *status == ProcessingStatus::Completed && *chunk_count == 1 && collection.is_some()
            })
            .returning(|_, _, _, _| Ok(()));

        let handler = FileHandler::new(
            Arc::new(StubExtractor("a short report")),
            Arc::new(embeddings),
            Arc::new(vectors),
            Arc::new(documents),
        );

        let payload = sample_payload();
        let envelope = JobEnvelope::File {
            correlation_id: CorrelationId::new(),
            payload: payload.clone(),
            retry_meta: None,
        };

        let outcome = handler.handle(&envelope).await.unwrap();
        assert!(outcome.reply.contains("chunk_count"));
    }

    #[test]
    fn markdown_preview_caps_at_ten_rows() {
        let header = vec!["a".to_string(), "b".to_string()];
        let rows: Vec<Vec<String>> = (0..20)
            .map(|i| vec![i.to_string(), i.to_string()])
            .collect();
        let preview = markdown_preview(&header, &rows);
        assert_eq!(preview.lines().count(), 2 + PREVIEW_ROWS);
    }
}
