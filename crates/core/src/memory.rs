//! Retrieved knowledge snippets ("memories") eligible for a prompt.
//!
//! Snippets arrive pre-ranked by relevance, most relevant first. Nothing in
//! the core reorders them; budget enforcement only truncates from the tail.

use serde::{Deserialize, Serialize};

/// A single retrieved, token-counted memory snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnippet {
    /// Opaque serialized text, rendered verbatim
    pub text: String,

    /// Token count of `text`, computed through a `TokenCounter`
    pub token_count: usize,

    /// Source label (document name, record id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Relevance score from retrieval
    #[serde(default)]
    pub score: f32,
}

impl MemorySnippet {
    pub fn new(text: impl Into<String>, token_count: usize) -> Self {
        Self {
            text: text.into(),
            token_count,
            source: None,
            score: 0.0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }
}

/// Sum of the token counts of a slice of snippets.
pub fn total_tokens(snippets: &[MemorySnippet]) -> usize {
    snippets.iter().map(|s| s.token_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_builder() {
        let s = MemorySnippet::new("Returns accepted within 30 days", 7)
            .with_source("policy.md")
            .with_score(0.91);
        assert_eq!(s.token_count, 7);
        assert_eq!(s.source.as_deref(), Some("policy.md"));
        assert!((s.score - 0.91).abs() < f32::EPSILON);
    }

    #[test]
    fn snippet_serialization_skips_missing_source() {
        let s = MemorySnippet::new("fact", 1);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("source"));
        assert!(json.contains("fact"));
    }

    #[test]
    fn totals_sum_token_counts() {
        let snippets = vec![MemorySnippet::new("a", 3), MemorySnippet::new("b", 4)];
        assert_eq!(total_tokens(&snippets), 7);
        assert_eq!(total_tokens(&[]), 0);
    }
}
