//! Process-local vector store backed by a lock-guarded `Vec`.

use async_trait::async_trait;
use recollect_core::error::VectorStoreError;
use recollect_core::vector_store::{VectorMatch, VectorRecord, VectorStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::vector::{evict_oldest, rank_by_similarity, upsert_record};

/// A vector store that keeps rows in a Vec and scans it on lookup.
pub struct InMemoryVectorStore {
    records: Arc<RwLock<Vec<VectorRecord>>>,
    max_entries: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            max_entries: None,
        }
    }

    /// Bound each partition to `max_entries` rows, evicting the oldest.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Snapshot of a stored row, by ID.
    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), VectorStoreError> {
    if cancel.is_cancelled() {
        return Err(VectorStoreError::QueryFailed("operation cancelled".into()));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn nearest(
        &self,
        partition_key: &str,
        embedding: &[f32],
        top_n: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        ensure_live(cancel)?;
        let records = self.records.read().await;
        let matches = rank_by_similarity(&records, partition_key, embedding, top_n, min_score);
        debug!(partition = partition_key, scanned = records.len(), matched = matches.len(), "Vector lookup");
        Ok(matches)
    }

    async fn upsert(
        &self,
        record: VectorRecord,
        cancel: &CancellationToken,
    ) -> Result<(), VectorStoreError> {
        ensure_live(cancel)?;
        let partition = record.partition_key.clone();
        let id = record.id.clone();
        let mut records = self.records.write().await;
        upsert_record(&mut records, record);
        if let Some(max) = self.max_entries {
            let evicted = evict_oldest(&mut records, &partition, max, &id);
            if evicted > 0 {
                warn!(partition = %partition, evicted, max, "Evicted oldest vector rows");
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        self.records.write().await.clear();
        Ok(())
    }
}
