use recollect_core::error::{EmbeddingError, TokenizerError, VectorStoreError};
use thiserror::Error;

/// Errors from semantic cache lookups and stores.
///
/// A miss is not an error; it is a [`CacheOutcome::Miss`](recollect_core::CacheOutcome) item.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    /// A stored row whose metadata is not a cache entry
    #[error("Malformed cache entry {id}: {source}")]
    MalformedEntry {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache item has no completion to store")]
    Unresolved,

    #[error("Cache operation cancelled")]
    Cancelled,
}

impl From<CacheError> for recollect_core::Error {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Embedding(e) => Self::Embedding(e),
            CacheError::VectorStore(e) => Self::VectorStore(e),
            CacheError::Tokenizer(e) => Self::Tokenizer(e),
            CacheError::Serialization(e) => Self::Serialization(e),
            other => Self::Internal(other.to_string()),
        }
    }
}
