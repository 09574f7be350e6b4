//! Lookup and store counters.

use std::sync::atomic::{AtomicU64, Ordering};

use recollect_core::cache::CacheOutcome;
use serde::{Deserialize, Serialize};

/// Running counters, updated lock-free on every lookup and store.
#[derive(Debug, Default)]
pub struct CacheStats {
    repeat_hits: AtomicU64,
    similar_hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: CacheOutcome) {
        let counter = match outcome {
            CacheOutcome::RepeatHit => &self.repeat_hits,
            CacheOutcome::SimilarHit => &self.similar_hits,
            CacheOutcome::Miss => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            repeat_hits: self.repeat_hits.load(Ordering::Relaxed),
            similar_hits: self.similar_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub repeat_hits: u64,
    pub similar_hits: u64,
    pub misses: u64,
    pub stores: u64,
}

impl StatsSnapshot {
    pub fn lookups(&self) -> u64 {
        self.repeat_hits + self.similar_hits + self.misses
    }

    /// Fraction of lookups answered from cache; 0.0 before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            return 0.0;
        }
        (self.repeat_hits + self.similar_hits) as f64 / total as f64
    }
}
