//! # recollect-cache
//!
//! Semantic completion cache keyed by conversation context, with per-session
//! conversation state.
//!
//! ```text
//! registry.lock(session) ─► get_cache_item(prompt, history)
//!                              │
//!                  hit ◄───────┴───────► miss ─► completion model ─► set_cache_item
//! ```

pub mod error;
pub mod semantic;
pub mod session;
pub mod stats;

pub use error::CacheError;
pub use semantic::{CacheSettings, SemanticCache};
pub use session::SessionRegistry;
pub use stats::{CacheStats, StatsSnapshot};
