//! Embedding generator trait: text to fixed-length float vectors.
//!
//! The core never computes embeddings itself. Implementations wrap a remote
//! or local embedding model and own their timeouts and retries.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::EmbeddingError;

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// The model name used for embeddings (e.g., "text-embedding-3-small").
    fn model_name(&self) -> &str;

    /// Embed a single text.
    ///
    /// Fails with [`EmbeddingError::Unavailable`] on transport or model
    /// errors. Implementations should stop work once `cancel` fires.
    async fn embed(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbeddingError>;
}
