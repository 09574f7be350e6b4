//! Semantic completion cache.
//!
//! A lookup resolves into exactly one [`CacheOutcome`]:
//!
//! 1. **Repeat hit**: the prompt is semantically the previous user turn of
//!    the same conversation. The previous answer is reused; the vector store
//!    is not queried.
//! 2. **Similar hit**: the conversation context (the prompt plus recent user
//!    turns) matches a stored row from any conversation.
//! 3. **Miss**: the caller obtains a completion, resolves the item and
//!    stores it with [`SemanticCache::set_cache_item`].
//!
//! Lookup calls are raced against a [`CancellationToken`]. A store checks
//! the token once before writing and then runs the write to completion, so
//! a store that returns [`CacheError::Cancelled`] has written nothing and one
//! that returns `Ok` has written the whole entry.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use recollect_config::{AppConfig, CacheConfig};
use recollect_context::{HistoryWindowBuilder, TokenCounter, tokenizer_from_config};
use recollect_core::cache::{CacheEntry, CacheItem, CacheOutcome};
use recollect_core::embedding::EmbeddingGenerator;
use recollect_core::message::{self, ConversationMessage};
use recollect_core::vector_store::{VectorRecord, VectorStore};
use recollect_memory::{cosine_similarity, open_store};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CacheError;
use crate::stats::{CacheStats, StatsSnapshot};

/// Joins user turns inside a conversation context.
const CONTEXT_SEPARATOR: &str = "\n";

/// Lookup parameters, usually taken from the `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Vector store partition holding cache rows
    pub partition_key: String,
    /// Minimum cosine similarity for both the repeat check and the row lookup
    pub min_relevance: f32,
    /// Token cap of the conversation context, prompt included
    pub conversation_context_max_tokens: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(c: &CacheConfig) -> Self {
        Self {
            partition_key: c.partition_key.clone(),
            min_relevance: c.min_relevance,
            conversation_context_max_tokens: c.conversation_context_max_tokens,
        }
    }
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, E>>,
    CacheError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = fut => result.map_err(CacheError::from),
    }
}

pub struct SemanticCache {
    embedder: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    counter: TokenCounter,
    settings: CacheSettings,
    stats: CacheStats,
}

impl SemanticCache {
    pub fn new(
        embedder: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
        counter: TokenCounter,
        settings: CacheSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            counter,
            settings,
            stats: CacheStats::new(),
        }
    }

    /// Wire a cache from configuration: tokenizer, store backend and lookup
    /// settings. The embedding model is always supplied by the host.
    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingGenerator>,
    ) -> Result<Self, CacheError> {
        let counter = tokenizer_from_config(&config.tokenizer)?;
        let store = open_store(&config.cache)?;
        debug!(
            encoder = counter.encoder(),
            backend = store.name(),
            model = embedder.model_name(),
            "Semantic cache configured"
        );
        Ok(Self::new(embedder, store, counter, CacheSettings::from(&config.cache)))
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Look up a completion for `user_prompt` given the session's prior
    /// `history` (not including the prompt itself).
    pub async fn get_cache_item(
        &self,
        user_prompt: &str,
        history: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> Result<CacheItem, CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let mut entry = CacheEntry::new(&self.settings.partition_key, user_prompt);
        entry.user_prompt_embedding =
            cancellable(cancel, self.embedder.embed(user_prompt, cancel)).await?;
        entry.user_prompt_tokens = self.counter.count(user_prompt)?;

        let item = match self.repeat_of_last_turn(&entry, history) {
            Some(item) => item,
            None => self.lookup_similar(entry, history, cancel).await?,
        };

        self.stats.record(item.outcome);
        debug!(
            outcome = %item.outcome,
            score = ?item.score,
            context_tokens = item.entry.conversation_context_tokens,
            "Cache lookup resolved"
        );
        Ok(item)
    }

    /// Persist a miss that the caller resolved with a fresh completion.
    ///
    /// Returns `Ok(false)` for hits, which are never stored again. The row is
    /// stamped with the time of the write so eviction order follows writes.
    pub async fn set_cache_item(
        &self,
        item: &CacheItem,
        cancel: &CancellationToken,
    ) -> Result<bool, CacheError> {
        if item.is_hit() {
            debug!(id = %item.entry.id, outcome = %item.outcome, "Skipping store of cache hit");
            return Ok(false);
        }
        if !item.entry.has_completion() {
            return Err(CacheError::Unresolved);
        }
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let entry = &item.entry;
        let record = VectorRecord {
            id: entry.id.clone(),
            partition_key: entry.partition_key.clone(),
            text: entry.conversation_context.clone(),
            embedding: entry.conversation_context_embedding.clone(),
            metadata_json: serde_json::to_string(entry)?,
            created_at: Utc::now(),
        };
        // Not raced: dropping a half-finished write could leave it applied.
        self.store.upsert(record, cancel).await?;

        self.stats.record_store();
        debug!(id = %entry.id, partition = %entry.partition_key, "Cache entry stored");
        Ok(true)
    }

    /// The previous answer, if the prompt repeats the last user turn.
    ///
    /// Needs the last user message's stored embedding and an assistant reply
    /// after it.
    fn repeat_of_last_turn(
        &self,
        entry: &CacheEntry,
        history: &[ConversationMessage],
    ) -> Option<CacheItem> {
        let index = message::last_user_index(history)?;
        let last = &history[index];
        let stored = last.embedding.as_deref()?;
        let reply = message::reply_after(history, index)?;

        let score = cosine_similarity(&entry.user_prompt_embedding, stored);
        if score < self.settings.min_relevance {
            debug!(score, threshold = self.settings.min_relevance, "Not a repeat of the last turn");
            return None;
        }

        let mut entry = entry.clone();
        entry.conversation_context = last.text.clone();
        entry.conversation_context_tokens = last.token_count;
        entry.conversation_context_embedding = stored.to_vec();
        entry.completion = reply.text.clone();
        entry.completion_tokens = reply.token_count;
        Some(CacheItem::hit(entry, CacheOutcome::RepeatHit, score))
    }

    async fn lookup_similar(
        &self,
        mut entry: CacheEntry,
        history: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> Result<CacheItem, CacheError> {
        let cap = self
            .settings
            .conversation_context_max_tokens
            .saturating_sub(entry.user_prompt_tokens);
        let window = HistoryWindowBuilder::new(cap).build_with_filter(history, ConversationMessage::is_user);

        entry.conversation_context_tokens = window.tokens_used + entry.user_prompt_tokens;
        entry.conversation_context = if window.is_empty() {
            entry.user_prompt.clone()
        } else {
            format!(
                "{}{CONTEXT_SEPARATOR}{}",
                window.join_text(CONTEXT_SEPARATOR),
                entry.user_prompt
            )
        };
        // A context of just the prompt already has its embedding.
        entry.conversation_context_embedding = if window.is_empty() {
            entry.user_prompt_embedding.clone()
        } else {
            cancellable(cancel, self.embedder.embed(&entry.conversation_context, cancel)).await?
        };

        let matches = cancellable(
            cancel,
            self.store.nearest(
                &self.settings.partition_key,
                &entry.conversation_context_embedding,
                1,
                self.settings.min_relevance,
                cancel,
            ),
        )
        .await?;

        let Some(best) = matches.into_iter().next() else {
            return Ok(CacheItem::miss(entry));
        };

        let stored: CacheEntry = serde_json::from_str(&best.metadata_json).map_err(|source| {
            CacheError::MalformedEntry {
                id: best.id.clone(),
                source,
            }
        })?;
        entry.completion = stored.completion;
        entry.completion_tokens = stored.completion_tokens;
        Ok(CacheItem::hit(entry, CacheOutcome::SimilarHit, best.score))
    }
}
