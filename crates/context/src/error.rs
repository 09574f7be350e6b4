use recollect_core::error::{PromptError, TokenizerError};
use thiserror::Error;

/// What could not fit when assembly gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExceededKind {
    /// The system prompt alone exceeds `system_max_tokens`
    SystemPrompt,
    /// Every trimming phase ran and the prompt still exceeds the ceiling
    Floors,
}

impl std::fmt::Display for BudgetExceededKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SystemPrompt => f.write_str("system prompt"),
            Self::Floors => f.write_str("memory and message floors"),
        }
    }
}

/// Errors from prompt assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Budget exceeded by {kind}: {required} tokens against a limit of {limit}")]
    BudgetExceeded {
        kind: BudgetExceededKind,
        required: usize,
        limit: usize,
    },

    #[error("Invalid prompt budget: {0}")]
    InvalidBudget(String),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl AssemblyError {
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. })
    }
}

impl From<AssemblyError> for recollect_core::Error {
    fn from(e: AssemblyError) -> Self {
        match e {
            AssemblyError::Tokenizer(e) => Self::Tokenizer(e),
            AssemblyError::Prompt(e) => Self::Prompt(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
