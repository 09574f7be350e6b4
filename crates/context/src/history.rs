//! Token-budgeted history windows.
//!
//! Walks a conversation most-recent-first and keeps the longest suffix whose
//! cumulative token count stays within a cap. The walk stops at the first
//! message that does not fit, so the window is always contiguous.

use recollect_core::message::ConversationMessage;

/// A contiguous, chronological slice of history that fits a token cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryWindow {
    /// Kept messages, oldest first
    pub messages: Vec<ConversationMessage>,
    /// Sum of the kept messages' token counts
    pub tokens_used: usize,
    /// Candidate messages left out of the window
    pub dropped: usize,
}

impl HistoryWindow {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message texts joined by `sep`, oldest first.
    pub fn join_text(&self, sep: &str) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Selects the most recent messages that fit a token cap.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindowBuilder {
    max_tokens: usize,
}

impl HistoryWindowBuilder {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Window over every message.
    pub fn build(&self, messages: &[ConversationMessage]) -> HistoryWindow {
        self.build_with_filter(messages, |_| true)
    }

    /// Window over the messages accepted by `filter` (e.g. user turns only).
    pub fn build_with_filter<F>(&self, messages: &[ConversationMessage], filter: F) -> HistoryWindow
    where
        F: Fn(&ConversationMessage) -> bool,
    {
        let candidates: Vec<&ConversationMessage> = messages.iter().filter(|m| filter(*m)).collect();

        let mut used = 0usize;
        let mut kept = 0usize;
        for msg in candidates.iter().rev() {
            match used.checked_add(msg.token_count) {
                Some(next) if next <= self.max_tokens => {
                    used = next;
                    kept += 1;
                }
                _ => break,
            }
        }

        let start = candidates.len() - kept;
        HistoryWindow {
            messages: candidates[start..].iter().map(|m| (*m).clone()).collect(),
            tokens_used: used,
            dropped: start,
        }
    }
}
