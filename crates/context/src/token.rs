//! Token counting.
//!
//! [`TokenCounter`] binds an injected [`Tokenizer`] to one encoder name and is
//! the only way budget-relevant text gets a token count. Built-in tokenizers:
//!
//! - [`HeuristicTokenizer`]: `heuristic` (~4 characters per token, rounded
//!   up) and `words` (whitespace-separated words). Always available.
//! - `TiktokenTokenizer`: OpenAI BPE encoders (feature `tiktoken`).
//! - `HuggingFaceTokenizer`: `tokenizer.json` files (feature `huggingface`).

use std::sync::Arc;

use recollect_config::TokenizerConfig;
use recollect_core::error::TokenizerError;
use recollect_core::memory::MemorySnippet;
use recollect_core::message::{ConversationMessage, Role};
use recollect_core::tokenizer::Tokenizer;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Character and word heuristics; no model files needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl HeuristicTokenizer {
    pub const ENCODERS: [&'static str; 2] = ["heuristic", "words"];
}

impl Tokenizer for HeuristicTokenizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn count(&self, text: &str, encoder: &str) -> Result<usize, TokenizerError> {
        match encoder {
            "heuristic" => Ok(estimate_tokens(text)),
            "words" => Ok(text.split_whitespace().count()),
            other => Err(TokenizerError::UnknownEncoder(other.to_string())),
        }
    }
}

/// A tokenizer bound to a single encoder.
#[derive(Clone)]
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
    encoder: String,
}

impl TokenCounter {
    /// Bind `tokenizer` to `encoder`, failing early if the encoder is unknown.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        encoder: impl Into<String>,
    ) -> Result<Self, TokenizerError> {
        let encoder = encoder.into();
        tokenizer.count("", &encoder)?;
        Ok(Self { tokenizer, encoder })
    }

    /// The 4-characters-per-token heuristic.
    pub fn heuristic() -> Self {
        Self {
            tokenizer: Arc::new(HeuristicTokenizer),
            encoder: "heuristic".into(),
        }
    }

    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    pub fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        self.tokenizer.count(text, &self.encoder)
    }

    /// A token-counted memory snippet.
    pub fn snippet(&self, text: impl Into<String>) -> Result<MemorySnippet, TokenizerError> {
        let text = text.into();
        let tokens = self.count(&text)?;
        Ok(MemorySnippet::new(text, tokens))
    }

    /// A token-counted conversation message.
    pub fn message(
        &self,
        role: Role,
        text: impl Into<String>,
    ) -> Result<ConversationMessage, TokenizerError> {
        let text = text.into();
        let tokens = self.count(&text)?;
        Ok(ConversationMessage::new(role, text, tokens))
    }

    pub fn user_message(&self, text: impl Into<String>) -> Result<ConversationMessage, TokenizerError> {
        self.message(Role::User, text)
    }

    pub fn assistant_message(
        &self,
        text: impl Into<String>,
    ) -> Result<ConversationMessage, TokenizerError> {
        self.message(Role::Assistant, text)
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("tokenizer", &self.tokenizer.name())
            .field("encoder", &self.encoder)
            .finish()
    }
}

/// Build the counter selected by the `[tokenizer]` configuration.
pub fn tokenizer_from_config(config: &TokenizerConfig) -> Result<TokenCounter, TokenizerError> {
    let encoder = config.encoder.as_str();

    if HeuristicTokenizer::ENCODERS.contains(&encoder) {
        return TokenCounter::new(Arc::new(HeuristicTokenizer), encoder);
    }

    #[cfg(feature = "tiktoken")]
    if tiktoken::TiktokenTokenizer::ENCODERS.contains(&encoder) {
        return TokenCounter::new(Arc::new(tiktoken::TiktokenTokenizer::new()), encoder);
    }

    #[cfg(feature = "huggingface")]
    if let Some(dir) = &config.tokenizer_dir {
        let tokenizer = huggingface::HuggingFaceTokenizer::from_dir(dir)?;
        return TokenCounter::new(Arc::new(tokenizer), encoder);
    }

    Err(TokenizerError::UnknownEncoder(encoder.to_string()))
}

#[cfg(feature = "tiktoken")]
pub mod tiktoken {
    //! OpenAI BPE encoders via `tiktoken-rs`, each loaded once on first use.

    use once_cell::sync::OnceCell;
    use recollect_core::error::TokenizerError;
    use recollect_core::tokenizer::Tokenizer;
    use tiktoken_rs::CoreBPE;

    #[derive(Default)]
    pub struct TiktokenTokenizer {
        cl100k: OnceCell<CoreBPE>,
        o200k: OnceCell<CoreBPE>,
        p50k: OnceCell<CoreBPE>,
        r50k: OnceCell<CoreBPE>,
    }

    impl TiktokenTokenizer {
        pub const ENCODERS: [&'static str; 4] =
            ["cl100k_base", "o200k_base", "p50k_base", "r50k_base"];

        pub fn new() -> Self {
            Self::default()
        }

        fn cell(&self, encoder: &str) -> Option<&OnceCell<CoreBPE>> {
            match encoder {
                "cl100k_base" => Some(&self.cl100k),
                "o200k_base" => Some(&self.o200k),
                "p50k_base" => Some(&self.p50k),
                "r50k_base" => Some(&self.r50k),
                _ => None,
            }
        }
    }

    fn load_bpe(encoder: &str) -> Result<CoreBPE, String> {
        let loaded = match encoder {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => return Err(format!("no BPE ranks for {other}")),
        };
        loaded.map_err(|e| e.to_string())
    }

    impl Tokenizer for TiktokenTokenizer {
        fn name(&self) -> &str {
            "tiktoken"
        }

        fn count(&self, text: &str, encoder: &str) -> Result<usize, TokenizerError> {
            let cell = self
                .cell(encoder)
                .ok_or_else(|| TokenizerError::UnknownEncoder(encoder.to_string()))?;
            let bpe = cell
                .get_or_try_init(|| load_bpe(encoder))
                .map_err(|reason| TokenizerError::LoadFailed {
                    encoder: encoder.to_string(),
                    reason,
                })?;
            Ok(bpe.encode_with_special_tokens(text).len())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn counts_with_cl100k() {
            let tok = TiktokenTokenizer::new();
            let n = tok.count("hello world", "cl100k_base").unwrap();
            assert!(n >= 2);
            assert_eq!(tok.count("", "cl100k_base").unwrap(), 0);
        }

        #[test]
        fn rejects_unknown_encoder() {
            let tok = TiktokenTokenizer::new();
            assert!(matches!(
                tok.count("x", "gpt2-ish"),
                Err(TokenizerError::UnknownEncoder(_))
            ));
        }
    }
}

#[cfg(feature = "huggingface")]
pub mod huggingface {
    //! HuggingFace `tokenizer.json` files, registered by encoder name.

    use std::collections::HashMap;
    use std::path::Path;

    use recollect_core::error::TokenizerError;
    use recollect_core::tokenizer::Tokenizer;
    use tracing::debug;

    #[derive(Default)]
    pub struct HuggingFaceTokenizer {
        encoders: HashMap<String, tokenizers::Tokenizer>,
    }

    impl HuggingFaceTokenizer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Load `path` and register it under `encoder`.
        pub fn register_file(&mut self, encoder: &str, path: &Path) -> Result<(), TokenizerError> {
            let tokenizer =
                tokenizers::Tokenizer::from_file(path).map_err(|e| TokenizerError::LoadFailed {
                    encoder: encoder.to_string(),
                    reason: e.to_string(),
                })?;
            self.encoders.insert(encoder.to_string(), tokenizer);
            Ok(())
        }

        /// Register every `<encoder>.json` file in `dir`.
        pub fn from_dir(dir: &Path) -> Result<Self, TokenizerError> {
            let mut this = Self::new();
            let entries = std::fs::read_dir(dir).map_err(|e| TokenizerError::LoadFailed {
                encoder: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
                let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if is_json {
                    let encoder = stem.to_string();
                    this.register_file(&encoder, &path)?;
                    debug!(encoder = %encoder, file = %path.display(), "Registered tokenizer file");
                }
            }
            Ok(this)
        }
    }

    impl Tokenizer for HuggingFaceTokenizer {
        fn name(&self) -> &str {
            "huggingface"
        }

        fn count(&self, text: &str, encoder: &str) -> Result<usize, TokenizerError> {
            let tokenizer = self
                .encoders
                .get(encoder)
                .ok_or_else(|| TokenizerError::UnknownEncoder(encoder.to_string()))?;
            if text.is_empty() {
                return Ok(0);
            }
            tokenizer
                .encode(text, false)
                .map(|encoding| encoding.len())
                .map_err(|e| TokenizerError::EncodeFailed {
                    encoder: encoder.to_string(),
                    reason: e.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn encoders_differ_on_same_text() {
        let tok = HeuristicTokenizer;
        let text = "the quick brown fox";
        assert_eq!(tok.count(text, "heuristic").unwrap(), 5);
        assert_eq!(tok.count(text, "words").unwrap(), 4);
    }

    #[test]
    fn unknown_encoder_fails() {
        let tok = HeuristicTokenizer;
        assert_eq!(
            tok.count("x", "cl100k_base_typo"),
            Err(TokenizerError::UnknownEncoder("cl100k_base_typo".into()))
        );
        assert!(!tok.supports("nope"));
        assert!(tok.supports("words"));
    }

    #[test]
    fn counter_validates_encoder_eagerly() {
        let err = TokenCounter::new(Arc::new(HeuristicTokenizer), "bogus").unwrap_err();
        assert!(matches!(err, TokenizerError::UnknownEncoder(_)));
    }

    #[test]
    fn counter_builds_counted_values() {
        let counter = TokenCounter::heuristic();
        let snippet = counter.snippet("Returns within 30 days").unwrap();
        assert_eq!(snippet.token_count, estimate_tokens("Returns within 30 days"));

        let msg = counter.user_message("hello").unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.token_count, 2);

        let reply = counter.assistant_message("hi").unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.token_count, 1);
    }

    #[test]
    fn counting_is_deterministic() {
        let counter = TokenCounter::heuristic();
        let text = "Deterministic for a fixed encoder.";
        assert_eq!(counter.count(text).unwrap(), counter.count(text).unwrap());
    }

    #[test]
    fn config_selects_heuristic_encoders() {
        let counter = tokenizer_from_config(&TokenizerConfig::default()).unwrap();
        assert_eq!(counter.encoder(), "heuristic");

        let words = TokenizerConfig {
            encoder: "words".into(),
            tokenizer_dir: None,
        };
        assert_eq!(tokenizer_from_config(&words).unwrap().count("a b c").unwrap(), 3);
    }

    #[test]
    fn config_rejects_unknown_encoder() {
        let config = TokenizerConfig {
            encoder: "mystery".into(),
            tokenizer_dir: None,
        };
        assert!(tokenizer_from_config(&config).is_err());
    }

    #[test]
    fn debug_shows_tokenizer_and_encoder() {
        let rendered = format!("{:?}", TokenCounter::heuristic());
        assert!(rendered.contains("heuristic"));
    }
}
