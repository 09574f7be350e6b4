//! Prompt assembly under a token budget.
//!
//! Builds a prompt from three segments:
//!
//! 1. **System** prompt. Never trimmed; too large is a configuration error.
//! 2. **Memories**, most relevant first. Trimmed from the tail.
//! 3. **Messages**, oldest first. Trimmed from the head; the most recent
//!    message is only ever dropped by failing the whole assembly.
//!
//! Trimming runs in progressively stricter phases (see [`TrimPhase`]) and
//! stops at the first phase after which the prompt fits. Surviving items
//! keep their input order.
//!
//! # Determinism
//!
//! Identical inputs always produce identical outputs. Assembly does no I/O
//! and holds no state besides its [`TokenCounter`].

use recollect_core::memory::{self, MemorySnippet};
use recollect_core::message::ConversationMessage;
use recollect_core::prompt::SystemPromptProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::PromptBudget;
use crate::error::{AssemblyError, BudgetExceededKind};
use crate::history::HistoryWindowBuilder;
use crate::token::TokenCounter;

/// Header of the rendered memories section.
pub const MEMORY_HEADER: &str = "[Memories]";
/// Placed between consecutive memories.
pub const MEMORY_SEPARATOR: &str = "\n---\n";
/// Header of the rendered conversation section.
pub const CONVERSATION_HEADER: &str = "[Conversation]";

// ── Types ─────────────────────────────────────────────────────────────────

/// The trimming phase at which assembly settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPhase {
    /// Everything fit
    Untrimmed,
    /// Memories and messages were cut to their segment ceilings
    Capped,
    /// Memories were removed down toward `memory_min_tokens`
    MemoriesEliminated,
    /// Old messages were removed down toward `messages_min_tokens`
    MessagesEliminated,
    /// One memory and/or one message was removed below its floor
    ForcedEviction,
}

/// The assembled prompt, ready for a completion call.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// Rendered prompt text
    pub prompt: String,
    /// Surviving memories, in input order
    pub memories: Vec<MemorySnippet>,
    /// Surviving messages, in input order
    pub messages: Vec<ConversationMessage>,
    pub metadata: AssemblyMetadata,
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// System + memories + messages + safety buffer
    pub total_tokens: usize,
    pub max_prompt_tokens: usize,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
    /// Per-segment statistics: `system`, `memories`, `messages`.
    pub segments: Vec<SegmentStats>,
    /// Items dropped from each segment, one record per segment and reason.
    pub drops: Vec<DropInfo>,
    pub phase: TrimPhase,
}

impl AssemblyMetadata {
    pub fn segment(&self, name: &str) -> Option<&SegmentStats> {
        self.segments.iter().find(|s| s.name == name)
    }
}

/// Statistics for a single prompt segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub name: String,
    /// Tokens consumed by this segment.
    pub tokens: usize,
    /// Items included after budget trimming.
    pub items_included: usize,
    /// Total items available before trimming.
    pub items_total: usize,
}

/// Information about items dropped from a segment during budget enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInfo {
    pub segment: String,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: String,
}

// ── Working set ───────────────────────────────────────────────────────────

const MEMORIES: &str = "memories";
const MESSAGES: &str = "messages";

/// Local copies of the candidate items plus running token totals.
struct WorkingSet {
    fixed_tokens: usize,
    limit: usize,
    memories: Vec<MemorySnippet>,
    memory_tokens: usize,
    messages: Vec<ConversationMessage>,
    message_tokens: usize,
    drops: Vec<DropInfo>,
}

impl WorkingSet {
    fn total(&self) -> usize {
        self.fixed_tokens + self.memory_tokens + self.message_tokens
    }

    fn fits(&self) -> bool {
        self.total() <= self.limit
    }

    fn record_drop(&mut self, segment: &str, tokens: usize, reason: &str) {
        match self.drops.last_mut() {
            Some(last) if last.segment == segment && last.reason == reason => {
                last.items_dropped += 1;
                last.tokens_dropped += tokens;
            }
            _ => self.drops.push(DropInfo {
                segment: segment.into(),
                items_dropped: 1,
                tokens_dropped: tokens,
                reason: reason.into(),
            }),
        }
    }

    /// Remove the least relevant memory.
    fn pop_memory(&mut self, reason: &str) -> bool {
        let Some(dropped) = self.memories.pop() else {
            return false;
        };
        self.memory_tokens -= dropped.token_count;
        self.record_drop(MEMORIES, dropped.token_count, reason);
        true
    }

    /// Remove the oldest message, unless it is the only (most recent) one.
    fn pop_oldest_message(&mut self, reason: &str) -> bool {
        if self.messages.len() <= 1 {
            return false;
        }
        let dropped = self.messages.remove(0);
        self.message_tokens -= dropped.token_count;
        self.record_drop(MESSAGES, dropped.token_count, reason);
        true
    }

    fn cap_memories(&mut self, max_tokens: usize) {
        let mut used = 0usize;
        let keep = self
            .memories
            .iter()
            .take_while(|m| {
                used += m.token_count;
                used <= max_tokens
            })
            .count();
        while self.memories.len() > keep {
            self.pop_memory("capped to memory_max_tokens");
        }
    }

    /// The most recent message survives the cap even when it alone exceeds
    /// `max_tokens`.
    fn cap_messages(&mut self, max_tokens: usize) {
        let window = HistoryWindowBuilder::new(max_tokens).build(&self.messages).len();
        let keep = window.max(self.messages.len().min(1));
        while self.messages.len() > keep {
            let dropped = self.messages.remove(0);
            self.message_tokens -= dropped.token_count;
            self.record_drop(MESSAGES, dropped.token_count, "capped to messages_max_tokens");
        }
    }

    fn eliminate_memories(&mut self, floor: usize) {
        while !self.fits() {
            let Some(last) = self.memories.last() else {
                break;
            };
            if self.memory_tokens - last.token_count < floor {
                break;
            }
            self.pop_memory("eliminated down to memory_min_tokens");
        }
    }

    fn eliminate_messages(&mut self, floor: usize) {
        while !self.fits() && self.messages.len() > 1 {
            if self.message_tokens - self.messages[0].token_count < floor {
                break;
            }
            self.pop_oldest_message("eliminated down to messages_min_tokens");
        }
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The prompt assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    counter: TokenCounter,
}

impl ContextAssembler {
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Assemble a prompt from a system prompt, ranked memories and
    /// chronological messages.
    ///
    /// # Algorithm
    ///
    /// 1. Fail if the system prompt alone exceeds `system_max_tokens`
    /// 2. If everything fits, render it unchanged
    /// 3. Cap memories to the longest prefix within `memory_max_tokens`
    /// 4. Cap messages to the longest suffix within `messages_max_tokens`,
    ///    never fewer than the most recent message
    /// 5. Drop tail memories while over budget, down to `memory_min_tokens`
    /// 6. Drop oldest messages while over budget, down to
    ///    `messages_min_tokens`, always keeping the most recent message
    /// 7. Drop one more memory, then one more message; fail if still over
    pub fn build(
        &self,
        system_prompt: &str,
        memories: &[MemorySnippet],
        messages: &[ConversationMessage],
        budget: &PromptBudget,
    ) -> Result<AssembledPrompt, AssemblyError> {
        budget.validate()?;

        let system_tokens = self.counter.count(system_prompt)?;
        if system_tokens > budget.system_max_tokens {
            return Err(AssemblyError::BudgetExceeded {
                kind: BudgetExceededKind::SystemPrompt,
                required: system_tokens,
                limit: budget.system_max_tokens,
            });
        }

        let mut set = WorkingSet {
            fixed_tokens: system_tokens + budget.safety_buffer_tokens,
            limit: budget.max_prompt_tokens(),
            memories: memories.to_vec(),
            memory_tokens: memory::total_tokens(memories),
            messages: messages.to_vec(),
            message_tokens: messages.iter().map(|m| m.token_count).sum(),
            drops: Vec::new(),
        };

        let phase = Self::trim(&mut set, budget)?;
        debug!(
            ?phase,
            total = set.total(),
            limit = set.limit,
            memories = set.memories.len(),
            messages = set.messages.len(),
            "Prompt assembled"
        );

        let prompt = render(system_prompt, &set.memories, &set.messages);
        let total_tokens = set.total();
        let segments = vec![
            SegmentStats {
                name: "system".into(),
                tokens: system_tokens,
                items_included: 1,
                items_total: 1,
            },
            SegmentStats {
                name: MEMORIES.into(),
                tokens: set.memory_tokens,
                items_included: set.memories.len(),
                items_total: memories.len(),
            },
            SegmentStats {
                name: MESSAGES.into(),
                tokens: set.message_tokens,
                items_included: set.messages.len(),
                items_total: messages.len(),
            },
        ];

        Ok(AssembledPrompt {
            prompt,
            metadata: AssemblyMetadata {
                total_tokens,
                max_prompt_tokens: set.limit,
                utilization_pct: (total_tokens as f32 / set.limit as f32) * 100.0,
                segments,
                drops: set.drops,
                phase,
            },
            memories: set.memories,
            messages: set.messages,
        })
    }

    /// Resolve the system prompt by name, then [`build`](Self::build).
    pub fn build_named(
        &self,
        prompt_name: &str,
        provider: &dyn SystemPromptProvider,
        memories: &[MemorySnippet],
        messages: &[ConversationMessage],
        budget: &PromptBudget,
    ) -> Result<AssembledPrompt, AssemblyError> {
        let system_prompt = provider.get(prompt_name)?;
        self.build(&system_prompt, memories, messages, budget)
    }

    fn trim(set: &mut WorkingSet, budget: &PromptBudget) -> Result<TrimPhase, AssemblyError> {
        if set.fits() {
            return Ok(TrimPhase::Untrimmed);
        }

        set.cap_memories(budget.memory_max_tokens);
        set.cap_messages(budget.messages_max_tokens);
        if set.fits() {
            return Ok(TrimPhase::Capped);
        }

        set.eliminate_memories(budget.memory_min_tokens);
        if set.fits() {
            return Ok(TrimPhase::MemoriesEliminated);
        }

        set.eliminate_messages(budget.messages_min_tokens);
        if set.fits() {
            return Ok(TrimPhase::MessagesEliminated);
        }

        // Floors tie-break: memories before messages.
        set.pop_memory("forced below memory_min_tokens");
        if set.fits() {
            return Ok(TrimPhase::ForcedEviction);
        }
        set.pop_oldest_message("forced below messages_min_tokens");
        if set.fits() {
            return Ok(TrimPhase::ForcedEviction);
        }

        debug!(total = set.total(), limit = set.limit, "Prompt does not fit after forced eviction");
        Err(AssemblyError::BudgetExceeded {
            kind: BudgetExceededKind::Floors,
            required: set.total(),
            limit: set.limit,
        })
    }
}

/// Render the prompt sections. Empty sections are omitted.
fn render(system_prompt: &str, memories: &[MemorySnippet], messages: &[ConversationMessage]) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !system_prompt.is_empty() {
        sections.push(system_prompt.to_string());
    }

    if !memories.is_empty() {
        let body = memories
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(MEMORY_SEPARATOR);
        sections.push(format!("{MEMORY_HEADER}\n{body}"));
    }

    if !messages.is_empty() {
        let body = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.text))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("{CONVERSATION_HEADER}\n{body}"));
    }

    sections.join("\n\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use recollect_core::message::Role;
    use recollect_core::prompt::StaticPromptProvider;

    // ── Helpers ────────────────────────────────────────────────────────

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(TokenCounter::heuristic())
    }

    /// A system prompt of exactly `tokens` heuristic tokens.
    fn system_of(tokens: usize) -> String {
        "abcd".repeat(tokens)
    }

    fn memories(count: usize, tokens: usize) -> Vec<MemorySnippet> {
        (0..count)
            .map(|i| MemorySnippet::new(format!("memory {i}"), tokens))
            .collect()
    }

    fn messages(count: usize, tokens: usize) -> Vec<ConversationMessage> {
        (0..count)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ConversationMessage::new(role, format!("message {i}"), tokens)
            })
            .collect()
    }

    fn budget(max_total: usize, reserve: usize, buffer: usize) -> PromptBudget {
        PromptBudget {
            max_total_tokens: max_total,
            completion_reserve_tokens: reserve,
            safety_buffer_tokens: buffer,
            system_max_tokens: 1500,
            memory_min_tokens: 0,
            memory_max_tokens: 100_000,
            messages_min_tokens: 0,
            messages_max_tokens: 100_000,
        }
    }

    // ── Tests ──────────────────────────────────────────────────────────

    #[test]
    fn everything_fits_untrimmed() {
        let mems = memories(2, 10);
        let msgs = messages(3, 10);
        let result = assembler()
            .build(&system_of(20), &mems, &msgs, &budget(4096, 300, 50))
            .unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::Untrimmed);
        assert_eq!(result.memories, mems);
        assert_eq!(result.messages.len(), 3);
        assert!(result.metadata.drops.is_empty());
        assert_eq!(result.metadata.total_tokens, 20 + 20 + 30 + 50);
    }

    #[test]
    fn memories_capped_to_ceiling() {
        // 4096 - 300 - 50 = 3746 prompt tokens; 200 go to the system prompt.
        let b = PromptBudget {
            memory_max_tokens: 3546,
            ..budget(4096, 300, 50)
        };
        let mems = memories(10, 400);
        let result = assembler().build(&system_of(200), &mems, &[], &b).unwrap();

        assert_eq!(b.max_prompt_tokens(), 3746);
        assert_eq!(result.memories.len(), 8);
        assert_eq!(result.memories[..], mems[..8]);
        assert_eq!(result.metadata.segment("memories").unwrap().tokens, 3200);
        assert!(result.metadata.total_tokens <= 3746);
        assert_eq!(result.metadata.phase, TrimPhase::Capped);

        let drop = &result.metadata.drops[0];
        assert_eq!(drop.segment, "memories");
        assert_eq!(drop.items_dropped, 2);
        assert_eq!(drop.tokens_dropped, 800);
    }

    #[test]
    fn memories_eliminated_down_to_floor() {
        let b = PromptBudget {
            memory_min_tokens: 1000,
            memory_max_tokens: 4000,
            messages_max_tokens: 3000,
            ..budget(4096, 300, 50)
        };
        let mems = memories(10, 400);
        let msgs = messages(11, 200);
        let result = assembler().build(&system_of(200), &mems, &msgs, &b).unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::MemoriesEliminated);
        let kept = memory::total_tokens(&result.memories);
        assert!(kept >= 1000);
        assert!(kept <= 3746 - 200 - 50 - 2200);
        assert_eq!(result.memories.len(), 3);
        assert_eq!(result.messages.len(), 11);
    }

    #[test]
    fn oversized_system_prompt_fails() {
        let err = assembler()
            .build(&system_of(1600), &memories(1, 1), &messages(1, 1), &budget(4096, 300, 50))
            .unwrap_err();
        match err {
            AssemblyError::BudgetExceeded { kind, required, limit } => {
                assert_eq!(kind, BudgetExceededKind::SystemPrompt);
                assert_eq!(required, 1600);
                assert_eq!(limit, 1500);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn messages_capped_keep_most_recent() {
        let b = PromptBudget {
            messages_max_tokens: 25,
            ..budget(100, 0, 0)
        };
        let msgs = messages(10, 10);
        let result = assembler().build(&system_of(10), &[], &msgs, &b).unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::Capped);
        let texts: Vec<&str> = result.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["message 8", "message 9"]);
    }

    #[test]
    fn message_elimination_respects_floor_and_keeps_latest() {
        let b = PromptBudget {
            messages_min_tokens: 0,
            ..budget(50, 0, 0)
        };
        let msgs = messages(5, 20);
        let result = assembler().build(&system_of(10), &[], &msgs, &b).unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::MessagesEliminated);
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.messages.last().unwrap().text, "message 4");
    }

    #[test]
    fn forced_eviction_goes_below_floors() {
        let b = PromptBudget {
            memory_min_tokens: 500,
            memory_max_tokens: 1000,
            messages_min_tokens: 500,
            messages_max_tokens: 1000,
            ..budget(1000, 0, 0)
        };
        let result = assembler()
            .build(&system_of(100), &memories(3, 300), &messages(3, 300), &b)
            .unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::ForcedEviction);
        assert_eq!(result.memories.len(), 1);
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.metadata.total_tokens, 1000);
        assert!(result.metadata.drops.iter().any(|d| d.reason.starts_with("forced")));
    }

    #[test]
    fn inconsistent_floors_fail() {
        let b = PromptBudget {
            memory_min_tokens: 500,
            memory_max_tokens: 1000,
            messages_min_tokens: 500,
            messages_max_tokens: 1000,
            ..budget(600, 0, 0)
        };
        let err = assembler()
            .build(&system_of(100), &memories(3, 300), &messages(3, 300), &b)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::BudgetExceeded {
                kind: BudgetExceededKind::Floors,
                ..
            }
        ));
    }

    #[test]
    fn message_cap_keeps_an_oversized_latest_message() {
        let b = PromptBudget {
            messages_max_tokens: 5,
            ..budget(100, 0, 0)
        };
        let mems = memories(1, 100);
        let msgs = vec![ConversationMessage::new(Role::User, "what changed?", 10)];
        let result = assembler().build(&system_of(1), &mems, &msgs, &b).unwrap();

        assert_eq!(result.metadata.phase, TrimPhase::MemoriesEliminated);
        assert!(result.memories.is_empty());
        assert_eq!(result.messages, msgs);
        assert!(result.prompt.ends_with("[Conversation]\nuser: what changed?"));
    }

    #[test]
    fn latest_message_over_cap_and_budget_fails() {
        let b = PromptBudget {
            messages_max_tokens: 5,
            ..budget(20, 0, 0)
        };
        let err = assembler()
            .build(&system_of(1), &[], &messages(3, 30), &b)
            .unwrap_err();
        match err {
            AssemblyError::BudgetExceeded { kind, required, limit } => {
                assert_eq!(kind, BudgetExceededKind::Floors);
                assert_eq!(required, 31);
                assert_eq!(limit, 20);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn lone_oversized_message_is_never_evicted() {
        let err = assembler()
            .build(&system_of(10), &[], &messages(1, 2000), &budget(1000, 0, 0))
            .unwrap_err();
        assert!(err.is_budget_exceeded());
    }

    #[test]
    fn invalid_budget_rejected() {
        let b = PromptBudget {
            memory_min_tokens: 10,
            memory_max_tokens: 5,
            ..budget(1000, 0, 0)
        };
        let err = assembler().build("sys", &[], &[], &b).unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidBudget(_)));
    }

    #[test]
    fn render_order_and_sections() {
        let mems = vec![
            MemorySnippet::new("Returns within 30 days", 6),
            MemorySnippet::new("Refunds go to the original card", 8),
        ];
        let msgs = vec![
            ConversationMessage::user("Can I return shoes?", 5),
            ConversationMessage::assistant("Yes, within 30 days.", 5),
        ];
        let result = assembler()
            .build("You are a support agent.", &mems, &msgs, &budget(4096, 300, 50))
            .unwrap();

        let expected = "You are a support agent.\n\n\
                        [Memories]\nReturns within 30 days\n---\nRefunds go to the original card\n\n\
                        [Conversation]\nuser: Can I return shoes?\nassistant: Yes, within 30 days.";
        assert_eq!(result.prompt, expected);
    }

    #[test]
    fn empty_segments_produce_no_sections() {
        let result = assembler()
            .build("system only", &[], &[], &budget(4096, 300, 50))
            .unwrap();
        assert_eq!(result.prompt, "system only");
        assert!(!result.prompt.contains(MEMORY_HEADER));
        assert!(!result.prompt.contains(CONVERSATION_HEADER));
    }

    #[test]
    fn metadata_totals_accurate() {
        let result = assembler()
            .build(&system_of(40), &memories(2, 30), &messages(2, 20), &budget(1000, 100, 10))
            .unwrap();
        let sum: usize = result.metadata.segments.iter().map(|s| s.tokens).sum();
        assert_eq!(result.metadata.total_tokens, sum + 10);
        assert_eq!(result.metadata.max_prompt_tokens, 890);
        assert!(result.metadata.utilization_pct > 0.0);
        assert!(result.metadata.utilization_pct <= 100.0);
    }

    #[test]
    fn deterministic_assembly() {
        let mems = memories(6, 50);
        let msgs = messages(6, 50);
        let b = PromptBudget {
            memory_max_tokens: 200,
            ..budget(400, 0, 20)
        };
        let first = assembler().build(&system_of(30), &mems, &msgs, &b).unwrap();
        let second = assembler().build(&system_of(30), &mems, &msgs, &b).unwrap();
        assert_eq!(first.prompt, second.prompt);
        assert_eq!(first.metadata.drops, second.metadata.drops);
        assert_eq!(first.metadata.phase, second.metadata.phase);
    }

    #[test]
    fn metadata_serializes_phase_in_snake_case() {
        let b = PromptBudget {
            memory_max_tokens: 10,
            ..budget(100, 0, 0)
        };
        let result = assembler().build(&system_of(10), &memories(20, 5), &[], &b).unwrap();
        let json = serde_json::to_value(&result.metadata).unwrap();
        assert_eq!(json["phase"], "capped");
        assert_eq!(json["segments"][1]["items_included"], 2);
    }

    #[test]
    fn build_named_resolves_prompt() {
        let provider = StaticPromptProvider::new().with_prompt("support", "Be helpful.");
        let result = assembler()
            .build_named("support", &provider, &[], &[], &budget(4096, 300, 50))
            .unwrap();
        assert_eq!(result.prompt, "Be helpful.");

        let err = assembler()
            .build_named("missing", &provider, &[], &[], &budget(4096, 300, 50))
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Prompt(_)));
    }
}
