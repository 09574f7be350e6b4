//! Per-session conversation state.
//!
//! One async mutex per session, held in a concurrent map. Independent
//! sessions never contend; requests on the same session are serialized by
//! holding its guard across a lookup/store pair.

use std::sync::Arc;

use dashmap::DashMap;
use recollect_core::message::{Conversation, SessionId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Session id → conversation, each behind its own lock.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Arc<Mutex<Conversation>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's handle, created empty on first use.
    pub fn session(&self, id: &SessionId) -> Arc<Mutex<Conversation>> {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session = %id, "Session created");
                Arc::new(Mutex::new(Conversation::with_id(id.clone())))
            })
            .value()
            .clone()
    }

    /// Wait for exclusive access to a session's conversation.
    pub async fn lock(&self, id: &SessionId) -> OwnedMutexGuard<Conversation> {
        self.session(id).lock_owned().await
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<Mutex<Conversation>>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
