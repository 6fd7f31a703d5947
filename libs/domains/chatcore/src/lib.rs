//! Chat-orchestration domain: the job handlers the worker pool runs for the
//! `chat`, `file`, and `kb` topics, plus the building blocks they share
//! (prompt-injection defenses, token budgeting, chunking, and the secondary
//! analytics bus).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  JobHandler │  ← ChatHandler / FileHandler / KbHandler (handlers/)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │Collaborators│  ← LlmProvider / EmbeddingModel / VectorStore / DocumentStore (traits)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Primitives │  ← security, tokens, chunking, collections, prompts
//! └─────────────┘
//! ```

pub mod analytics;
pub mod chunking;
pub mod collections;
pub mod error;
pub mod handlers;
pub mod prompts;
pub mod security;
pub mod tokens;
pub mod traits;

pub use analytics::{AnalyticsEvent, LatencyStats, TimeSeriesPoint, WindowedMetric};
pub use error::{ChatCoreError, ChatCoreResult};
pub use handlers::{ChatHandler, ExtractedText, FileHandler, KbHandler, TextExtractor, RAG_COLLECTION};
pub use traits::{
    ConversationMessage, DocumentStore, EmbeddingModel, LlmCompletion, LlmMessage, LlmProvider,
    LlmRequest, ProcessingStatus, Role, TextChunkStream, VectorMatch, VectorPoint, VectorStore,
};
