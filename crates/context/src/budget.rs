//! Prompt token budget.

use recollect_config::BudgetConfig;
use serde::{Deserialize, Serialize};

use crate::error::AssemblyError;

/// Token limits for one prompt.
///
/// The prompt itself may use `max_total_tokens` minus the completion reserve
/// and the safety buffer. The buffer is also charged against the prompt when
/// checking whether assembled content fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    pub max_total_tokens: usize,
    pub completion_reserve_tokens: usize,
    pub safety_buffer_tokens: usize,
    pub system_max_tokens: usize,
    pub memory_min_tokens: usize,
    pub memory_max_tokens: usize,
    pub messages_min_tokens: usize,
    pub messages_max_tokens: usize,
}

impl PromptBudget {
    /// Tokens available to the prompt: total minus reserve and buffer.
    pub fn max_prompt_tokens(&self) -> usize {
        self.max_total_tokens
            .saturating_sub(self.completion_reserve_tokens)
            .saturating_sub(self.safety_buffer_tokens)
    }

    pub fn validate(&self) -> Result<(), AssemblyError> {
        if self.max_prompt_tokens() == 0 {
            return Err(AssemblyError::InvalidBudget(format!(
                "max_total_tokens ({}) must exceed completion_reserve_tokens ({}) + safety_buffer_tokens ({})",
                self.max_total_tokens, self.completion_reserve_tokens, self.safety_buffer_tokens
            )));
        }
        if self.memory_min_tokens > self.memory_max_tokens {
            return Err(AssemblyError::InvalidBudget(format!(
                "memory_min_tokens ({}) exceeds memory_max_tokens ({})",
                self.memory_min_tokens, self.memory_max_tokens
            )));
        }
        if self.messages_min_tokens > self.messages_max_tokens {
            return Err(AssemblyError::InvalidBudget(format!(
                "messages_min_tokens ({}) exceeds messages_max_tokens ({})",
                self.messages_min_tokens, self.messages_max_tokens
            )));
        }
        Ok(())
    }
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self::from(&BudgetConfig::default())
    }
}

impl From<&BudgetConfig> for PromptBudget {
    fn from(c: &BudgetConfig) -> Self {
        Self {
            max_total_tokens: c.max_total_tokens,
            completion_reserve_tokens: c.completion_reserve_tokens,
            safety_buffer_tokens: c.safety_buffer_tokens,
            system_max_tokens: c.system_max_tokens,
            memory_min_tokens: c.memory_min_tokens,
            memory_max_tokens: c.memory_max_tokens,
            messages_min_tokens: c.messages_min_tokens,
            messages_max_tokens: c.messages_max_tokens,
        }
    }
}
