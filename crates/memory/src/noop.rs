//! Vector store that never matches and drops every write. Selected by
//! `backend = "none"` or a disabled cache.

use async_trait::async_trait;
use recollect_core::error::VectorStoreError;
use recollect_core::vector_store::{VectorMatch, VectorRecord, VectorStore};
use tokio_util::sync::CancellationToken;

/// A vector store that stores nothing.
pub struct NoopVectorStore;

#[async_trait]
impl VectorStore for NoopVectorStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn nearest(
        &self,
        _partition_key: &str,
        _embedding: &[f32],
        _top_n: usize,
        _min_score: f32,
        _cancel: &CancellationToken,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        Ok(Vec::new())
    }

    async fn upsert(
        &self,
        _record: VectorRecord,
        _cancel: &CancellationToken,
    ) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}
