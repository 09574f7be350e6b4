//! Tokenizer trait: the abstraction over named token encoders.
//!
//! Different encoders may yield different counts for identical text. For a
//! fixed encoder, counting is deterministic and side-effect free.

use crate::error::TokenizerError;

/// Counts tokens for a named encoder.
///
/// Implementations: heuristic (built in), tiktoken BPE, HuggingFace
/// `tokenizer.json` files.
pub trait Tokenizer: Send + Sync {
    /// The tokenizer family name (e.g., "heuristic", "tiktoken").
    fn name(&self) -> &str;

    /// Count the tokens of `text` under `encoder`.
    ///
    /// Fails with [`TokenizerError::UnknownEncoder`] when `encoder` is not
    /// recognised by this tokenizer.
    fn count(&self, text: &str, encoder: &str) -> Result<usize, TokenizerError>;

    /// Whether `encoder` is recognised.
    fn supports(&self, encoder: &str) -> bool {
        self.count("", encoder).is_ok()
    }
}
