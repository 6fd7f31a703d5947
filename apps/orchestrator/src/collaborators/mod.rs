//! Concrete implementations of `chatcore`'s external-collaborator traits.
//! `chatcore` itself ships no network client; these adapters are the
//! orchestrator's production wiring.

mod document_store;
mod llm_http;
mod text_extractor;
mod vector_store;

pub use document_store::RedisDocumentStore;
pub use llm_http::LlmHttpClient;
pub use text_extractor::PlainTextExtractor;
pub use vector_store::QdrantVectorStore;
