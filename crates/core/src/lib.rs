//! # Recollect Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! Recollect context-assembly and semantic-caching layer.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (tokenizer, embedding model, vector store,
//! system prompt source) is defined as a trait here. Implementations live in
//! their respective crates or in the host application. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod memory;
pub mod tokenizer;
pub mod embedding;
pub mod vector_store;
pub mod prompt;
pub mod cache;

// Re-export key types at crate root for ergonomics
pub use error::{EmbeddingError, Error, PromptError, Result, TokenizerError, VectorStoreError};
pub use message::{Conversation, ConversationMessage, Role, SessionId};
pub use memory::MemorySnippet;
pub use tokenizer::Tokenizer;
pub use embedding::EmbeddingGenerator;
pub use vector_store::{VectorMatch, VectorRecord, VectorStore};
pub use prompt::{FilePromptProvider, StaticPromptProvider, SystemPromptProvider};
pub use cache::{CacheEntry, CacheItem, CacheOutcome};
