//! Error types for the Recollect domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error variant.

use thiserror::Error;

/// The top-level error type for all Recollect operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tokenizer errors ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Vector store errors ---
    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    // --- Prompt errors ---
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizerError {
    #[error("Unknown encoder: {0}")]
    UnknownEncoder(String),

    #[error("Tokenizer failed to load encoder {encoder}: {reason}")]
    LoadFailed { encoder: String, reason: String },

    #[error("Encoding failed with {encoder}: {reason}")]
    EncodeFailed { encoder: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum VectorStoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("System prompt not found: {0}")]
    NotFound(String),

    #[error("Failed to read system prompt {name}: {reason}")]
    Read { name: String, reason: String },
}
