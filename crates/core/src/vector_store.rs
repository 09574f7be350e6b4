//! Vector store trait: nearest-neighbour lookup over stored embeddings.
//!
//! The store owns indexing and partitioning. The core only asks for the
//! nearest rows of a partition above a score, and upserts new rows with an
//! opaque JSON metadata payload that it reads back unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::VectorStoreError;

/// A row written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique row ID; upserting the same ID twice keeps one row
    pub id: String,

    /// Scoping key; lookups never cross partitions
    pub partition_key: String,

    /// The text the embedding was computed from
    pub text: String,

    /// The embedding searched against
    pub embedding: Vec<f32>,

    /// Opaque serialized payload, returned verbatim on a match
    pub metadata_json: String,

    /// When this row was first written
    pub created_at: DateTime<Utc>,
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub metadata_json: String,
    /// Similarity between the query and the stored embedding
    pub score: f32,
}

/// The core VectorStore trait.
///
/// Implementations: in-memory, JSONL file, none (no-op).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "none").
    fn name(&self) -> &str;

    /// Up to `top_n` rows of `partition_key` whose score is at least
    /// `min_score`, best first.
    async fn nearest(
        &self,
        partition_key: &str,
        embedding: &[f32],
        top_n: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    /// Insert a row, or replace the row with the same ID.
    async fn upsert(
        &self,
        record: VectorRecord,
        cancel: &CancellationToken,
    ) -> Result<(), VectorStoreError>;

    /// Total row count across partitions.
    async fn count(&self) -> Result<usize, VectorStoreError>;

    /// Remove every row.
    async fn clear(&self) -> Result<(), VectorStoreError>;
}
