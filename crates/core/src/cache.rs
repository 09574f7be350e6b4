//! Semantic cache domain types.
//!
//! A [`CacheEntry`] is created per lookup and persisted only when a miss is
//! resolved with a fresh completion. Persisted entries are never mutated;
//! every miss becomes a new, independent row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cache row as serialized into the vector store's metadata payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fresh per lookup
    pub id: String,

    /// Vector store partition the row lives in
    pub partition_key: String,

    pub user_prompt: String,

    #[serde(default)]
    pub user_prompt_embedding: Vec<f32>,

    #[serde(default)]
    pub user_prompt_tokens: usize,

    /// Rendered window of recent user turns, the row's semantic anchor
    #[serde(default)]
    pub conversation_context: String,

    #[serde(default)]
    pub conversation_context_embedding: Vec<f32>,

    #[serde(default)]
    pub conversation_context_tokens: usize,

    /// Empty until resolved
    #[serde(default)]
    pub completion: String,

    #[serde(default)]
    pub completion_tokens: usize,

    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A new, unresolved entry with a fresh ID.
    pub fn new(partition_key: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            partition_key: partition_key.into(),
            user_prompt: user_prompt.into(),
            user_prompt_embedding: Vec::new(),
            user_prompt_tokens: 0,
            conversation_context: String::new(),
            conversation_context_embedding: Vec::new(),
            conversation_context_tokens: 0,
            completion: String::new(),
            completion_tokens: 0,
            created_at: Utc::now(),
        }
    }

    pub fn has_completion(&self) -> bool {
        !self.completion.is_empty()
    }
}

/// How a lookup resolved. Exactly one per `get_cache_item` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    /// The prompt repeats the previous user turn of the same conversation.
    RepeatHit,
    /// A stored row from any conversation matched the conversation context.
    SimilarHit,
    /// Nothing matched; the caller must obtain a completion.
    Miss,
}

impl CacheOutcome {
    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheOutcome::Miss)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::RepeatHit => "repeat_hit",
            CacheOutcome::SimilarHit => "similar_hit",
            CacheOutcome::Miss => "miss",
        }
    }
}

impl std::fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    pub entry: CacheEntry,
    pub outcome: CacheOutcome,
    /// Similarity that produced a hit
    pub score: Option<f32>,
}

impl CacheItem {
    pub fn miss(entry: CacheEntry) -> Self {
        Self {
            entry,
            outcome: CacheOutcome::Miss,
            score: None,
        }
    }

    pub fn hit(entry: CacheEntry, outcome: CacheOutcome, score: f32) -> Self {
        Self {
            entry,
            outcome,
            score: Some(score),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.outcome.is_hit()
    }

    /// The cached completion; empty on a miss.
    pub fn completion(&self) -> &str {
        &self.entry.completion
    }

    /// Record the fresh completion obtained after a miss.
    pub fn resolve(&mut self, completion: impl Into<String>, completion_tokens: usize) {
        self.entry.completion = completion.into();
        self.entry.completion_tokens = completion_tokens;
    }
}
