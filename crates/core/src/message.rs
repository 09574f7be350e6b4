//! Conversation domain types.
//!
//! Messages are owned by the calling session. The core only ever reads an
//! immutable snapshot (`&[ConversationMessage]`) per call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token-counted message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub text: String,

    /// Token count of `text`, computed through a `TokenCounter`
    pub token_count: usize,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Embedding of a user prompt, as returned by the semantic cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ConversationMessage {
    /// Create a message with an already computed token count.
    pub fn new(role: Role, text: impl Into<String>, token_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            token_count,
            timestamp: Utc::now(),
            embedding: None,
        }
    }

    /// Create a new user message.
    pub fn user(text: impl Into<String>, token_count: usize) -> Self {
        Self::new(Role::User, text, token_count)
    }

    /// Create a new assistant message.
    pub fn assistant(text: impl Into<String>, token_count: usize) -> Self {
        Self::new(Role::Assistant, text, token_count)
    }

    /// Attach the prompt embedding used by the repeat check.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Index of the most recent user message in a chronological slice.
pub fn last_user_index(messages: &[ConversationMessage]) -> Option<usize> {
    messages.iter().rposition(ConversationMessage::is_user)
}

/// The assistant reply that directly follows the message at `index`, if any.
pub fn reply_after(messages: &[ConversationMessage], index: usize) -> Option<&ConversationMessage> {
    messages
        .get(index + 1..)?
        .iter()
        .find(|m| m.role == Role::Assistant)
}

/// A conversation is the ordered message history of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Session this history belongs to
    pub id: SessionId,

    /// Ordered messages, oldest first
    pub messages: Vec<ConversationMessage>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Create an empty conversation for a known session.
    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: ConversationMessage) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Sum of the stored token counts.
    pub fn total_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.token_count).sum()
    }

    /// The most recent user message.
    pub fn last_user(&self) -> Option<&ConversationMessage> {
        last_user_index(&self.messages).map(|i| &self.messages[i])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
