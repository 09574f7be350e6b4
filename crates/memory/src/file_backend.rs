//! Vector store persisted as JSON lines, one [`VectorRecord`] per line.
//!
//! Rows are loaded into memory on creation. Every mutation writes the full
//! row set to a sibling temp file and renames it over the store file; the
//! in-memory rows only change once that rename succeeds.
//!
//! Storage location: `~/.recollect/cache/entries.jsonl` by default.

use async_trait::async_trait;
use recollect_core::error::VectorStoreError;
use recollect_core::vector_store::{VectorMatch, VectorRecord, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::vector::{evict_oldest, rank_by_similarity, upsert_record};

/// A file-backed vector store using JSONL (one JSON object per line).
pub struct FileVectorStore {
    path: PathBuf,
    records: Arc<RwLock<Vec<VectorRecord>>>,
    max_entries: Option<usize>,
}

impl FileVectorStore {
    /// Open the store at `path`.
    ///
    /// If the file exists, rows are loaded from it. If it does not, the
    /// store starts empty and the file is created on first write.
    pub fn new(path: PathBuf) -> Self {
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "File vector store loaded");
        Self {
            path,
            records: Arc::new(RwLock::new(records)),
            max_entries: None,
        }
    }

    /// Bound each partition to `max_entries` rows, evicting the oldest.
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<VectorRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<VectorRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted vector row");
                    None
                }
            })
            .collect()
    }

    async fn flush(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VectorStoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                VectorStoreError::Storage(format!("Failed to serialize vector row: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, content).await.map_err(|e| {
            VectorStoreError::Storage(format!("Failed to write store file: {e}"))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(VectorStoreError::Storage(format!(
                "Failed to replace store file: {e}"
            )));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn nearest(
        &self,
        partition_key: &str,
        embedding: &[f32],
        top_n: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        if cancel.is_cancelled() {
            return Err(VectorStoreError::QueryFailed("operation cancelled".into()));
        }
        let records = self.records.read().await;
        Ok(rank_by_similarity(&records, partition_key, embedding, top_n, min_score))
    }

    async fn upsert(
        &self,
        record: VectorRecord,
        cancel: &CancellationToken,
    ) -> Result<(), VectorStoreError> {
        if cancel.is_cancelled() {
            return Err(VectorStoreError::Storage("operation cancelled".into()));
        }
        let partition = record.partition_key.clone();
        let id = record.id.clone();
        let mut records = self.records.write().await;
        let mut next = records.clone();
        upsert_record(&mut next, record);
        let evicted = match self.max_entries {
            Some(max) => evict_oldest(&mut next, &partition, max, &id),
            None => 0,
        };
        self.flush(&next).await?;
        *records = next;
        if evicted > 0 {
            warn!(partition = %partition, evicted, max = ?self.max_entries, "Evicted oldest vector rows");
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        let mut records = self.records.write().await;
        self.flush(&[]).await?;
        records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            partition_key: "cache".into(),
            text: format!("context {id}"),
            embedding,
            metadata_json: format!(r#"{{"completion":"answer {id}"}}"#),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("entries.jsonl");
        let cancel = CancellationToken::new();

        let store = FileVectorStore::new(path.clone());
        store.upsert(record("a", vec![1.0, 0.0]), &cancel).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("answer a"));

        let reopened = FileVectorStore::new(path);
        let hits = reopened.nearest("cache", &[1.0, 0.0], 1, 0.9, &cancel).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].metadata_json.contains("answer a"));
    }

    #[tokio::test]
    async fn same_id_keeps_one_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.jsonl");
        let cancel = CancellationToken::new();

        let store = FileVectorStore::new(path.clone());
        store.upsert(record("a", vec![1.0]), &cancel).await.unwrap();
        store.upsert(record("a", vec![1.0]), &cancel).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn clear_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.jsonl");
        let cancel = CancellationToken::new();

        let store = FileVectorStore::new(path.clone());
        store.upsert(record("a", vec![1.0]), &cancel).await.unwrap();
        store.clear().await.unwrap();

        let reopened = FileVectorStore::new(path);
        assert_eq!(reopened.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_write_leaves_rows_untouched() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();

        // A directory cannot be replaced by the store file.
        let store = FileVectorStore::new(dir.path().to_path_buf());
        let err = store.upsert(record("a", vec![1.0]), &cancel).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Storage(_)));

        assert_eq!(store.count().await.unwrap(), 0);
        let hits = store.nearest("cache", &[1.0], 1, 0.0, &cancel).await.unwrap();
        assert!(hits.is_empty());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn failed_clear_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.jsonl");
        let cancel = CancellationToken::new();

        let store = FileVectorStore::new(path.clone());
        store.upsert(record("a", vec![1.0]), &cancel).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        assert!(store.clear().await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bounded_file_store_evicts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("entries.jsonl");
        let cancel = CancellationToken::new();

        let store = FileVectorStore::new(path.clone()).with_max_entries(Some(1));
        store.upsert(record("a", vec![1.0]), &cancel).await.unwrap();
        store.upsert(record("b", vec![1.0]), &cancel).await.unwrap();

        let reopened = FileVectorStore::new(path);
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let dir = TempDir::new().unwrap();
        let store = FileVectorStore::new(dir.path().join("absent.jsonl"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skips_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"id":"1","partition_key":"cache","text":"t","embedding":[1.0],"metadata_json":"{{}}","created_at":"2026-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(tmp, r#"{{"id":"2","partition_key":"cache","text":"t","embedding":[0.5],"metadata_json":"{{}}","created_at":"2026-01-01T00:00:00Z"}}"#).unwrap();

        let store = FileVectorStore::new(tmp.path().to_path_buf());
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
