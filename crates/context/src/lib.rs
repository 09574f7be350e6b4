//! # recollect-context
//!
//! Token counting and budgeted prompt assembly.
//!
//! - [`TokenCounter`]: counts tokens through an injected tokenizer
//! - [`HistoryWindowBuilder`]: most-recent history that fits a token cap
//! - [`ContextAssembler`]: system prompt + memories + messages under a
//!   [`PromptBudget`]

pub mod assembler;
pub mod budget;
pub mod error;
pub mod history;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyMetadata, ContextAssembler, DropInfo, SegmentStats, TrimPhase,
};
pub use budget::PromptBudget;
pub use error::{AssemblyError, BudgetExceededKind};
pub use history::{HistoryWindow, HistoryWindowBuilder};
pub use token::{HeuristicTokenizer, TokenCounter, estimate_tokens, tokenizer_from_config};

#[cfg(feature = "tiktoken")]
pub use token::tiktoken::TiktokenTokenizer;

#[cfg(feature = "huggingface")]
pub use token::huggingface::HuggingFaceTokenizer;
