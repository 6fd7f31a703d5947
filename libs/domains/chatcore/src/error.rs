//! Error type shared by the chat/file/kb handlers and their pure-function helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatCoreError {
    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("embedding call failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("document store error: {0}")]
    DocumentStore(String),

    #[error("result channel error: {0}")]
    ResultChannel(String),

    #[error("empty document: no text could be extracted")]
    EmptyDocument,

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("secondary bus error: {0}")]
    Bus(#[from] bus::BusError),
}

pub type ChatCoreResult<T> = Result<T, ChatCoreError>;
