//! Context Store
//!
//! Ordered, bounded log of prior question/answer pairs used to ground
//! follow-up queries. Entries are immutable once stored; only append and
//! oldest-first eviction mutate the sequence. The serialized size of the
//! log is kept within a token budget estimated at roughly four characters
//! per token.

use std::collections::VecDeque;

/// Default context budget, in estimated tokens.
pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 4096;

/// Rough chars-per-token estimate used for budget accounting.
const CHARS_PER_TOKEN: usize = 4;

/// One stored question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub question: String,
    pub answer: String,
}

impl ContextEntry {
    fn estimated_tokens(&self) -> usize {
        let chars = self.question.chars().count() + self.answer.chars().count();
        chars.div_ceil(CHARS_PER_TOKEN)
    }
}

/// Insertion-ordered log of context entries with a token budget.
#[derive(Debug, Clone)]
pub struct ContextLog {
    entries: VecDeque<ContextEntry>,
    token_budget: usize,
    used_tokens: usize,
}

impl Default for ContextLog {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_TOKEN_BUDGET)
    }
}

impl ContextLog {
    /// Create a log bounded by the given token budget.
    pub fn new(token_budget: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            token_budget,
            used_tokens: 0,
        }
    }

    /// Append a question/answer pair, evicting oldest entries until the log
    /// fits the budget again. The entry just inserted is never evicted by
    /// its own insertion, even if it alone exceeds the budget.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let entry = ContextEntry {
            question: question.into(),
            answer: answer.into(),
        };
        self.used_tokens += entry.estimated_tokens();
        self.entries.push_back(entry);

        while self.used_tokens > self.token_budget && self.entries.len() > 1 {
            if let Some(evicted) = self.entries.pop_front() {
                self.used_tokens -= evicted.estimated_tokens();
                tracing::debug!(
                    question = %evicted.question,
                    "evicted oldest context entry over budget"
                );
            }
        }
    }

    /// Snapshot of the stored entries, oldest first.
    pub fn snapshot(&self) -> Vec<ContextEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Serialize the log into a context block for prompt assembly.
    ///
    /// Deterministic and idempotent: identical output until the next
    /// `append` or `reset`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Q: ");
            out.push_str(&entry.question);
            out.push_str("\nA: ");
            out.push_str(&entry.answer);
            out.push('\n');
        }
        out
    }

    /// Remove all entries. The budget is unchanged.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.used_tokens = 0;
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated tokens currently held.
    pub fn used_tokens(&self) -> usize {
        self.used_tokens
    }
}
