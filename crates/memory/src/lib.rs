//! Vector matching and reference vector stores for Recollect.

pub mod noop;
pub mod in_memory;
pub mod file_backend;
pub mod vector;

pub use noop::NoopVectorStore;
pub use in_memory::InMemoryVectorStore;
pub use file_backend::FileVectorStore;
pub use vector::{cosine_similarity, rank_by_similarity};

use std::sync::Arc;

use recollect_config::CacheConfig;
use recollect_core::error::VectorStoreError;
use recollect_core::vector_store::VectorStore;
use tracing::info;

/// Open the vector store selected by the `[cache]` configuration.
pub fn open_store(config: &CacheConfig) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    let store: Arc<dyn VectorStore> = match config.effective_backend() {
        "memory" => Arc::new(InMemoryVectorStore::new().with_max_entries(config.max_entries)),
        "file" => Arc::new(
            FileVectorStore::new(config.resolved_path()).with_max_entries(config.max_entries),
        ),
        "none" => Arc::new(NoopVectorStore),
        other => {
            return Err(VectorStoreError::Storage(format!(
                "Unknown vector store backend: {other}"
            )));
        }
    };
    info!(backend = store.name(), "Vector store opened");
    Ok(store)
}
