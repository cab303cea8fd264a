//! Streaming Support
//!
//! Incremental processing of streamed provider chunks. Reasoning models
//! interleave `<think>...</think>` spans with the visible answer; the
//! [`ThinkBlockFilter`] strips those spans across chunk boundaries while
//! holding back partial markers at a chunk edge so a tag split between two
//! chunks is never leaked.

use std::pin::Pin;

use futures::Stream;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AuxKnowError;
use crate::types::Answer;

/// Stream of answers: partial chunks followed by exactly one final answer,
/// or an error terminating the stream early.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<Answer, AuxKnowError>> + Send>>;

const THINK_START: &str = "<think>";
const THINK_END: &str = "</think>";

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block pattern"));
static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-run pattern"));

/// Remove `<think>` blocks and collapse runs of blank lines in a complete
/// answer text.
pub fn clean_answer(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    let without_think = THINK_BLOCK.replace_all(text, "");
    BLANK_RUNS
        .replace_all(without_think.trim(), "\n\n")
        .into_owned()
}

/// Incremental `<think>` block stripper.
///
/// Feed raw deltas with [`push`](Self::push) and emit whatever text became
/// visible; call [`flush`](Self::flush) once the stream ends to drain any
/// held-back tail. An unterminated think block is dropped entirely.
#[derive(Debug, Default)]
pub struct ThinkBlockFilter {
    pending: String,
    in_think: bool,
}

impl ThinkBlockFilter {
    /// Process one raw delta, returning the text that is now visible.
    pub fn push(&mut self, delta: &str) -> String {
        self.pending.push_str(delta);
        let mut visible = String::new();

        loop {
            if self.in_think {
                match self.pending.find(THINK_END) {
                    Some(end) => {
                        self.pending.drain(..end + THINK_END.len());
                        self.in_think = false;
                    }
                    None => {
                        // Keep only what could still be a partial end marker.
                        let keep = partial_marker_len(&self.pending, THINK_END);
                        let cut = self.pending.len() - keep;
                        self.pending.drain(..cut);
                        return visible;
                    }
                }
            } else {
                match self.pending.find(THINK_START) {
                    Some(start) => {
                        visible.push_str(&self.pending[..start]);
                        self.pending.drain(..start + THINK_START.len());
                        self.in_think = true;
                    }
                    None => {
                        // Emit everything except a possible partial start marker.
                        let keep = partial_marker_len(&self.pending, THINK_START);
                        let cut = self.pending.len() - keep;
                        visible.push_str(&self.pending[..cut]);
                        self.pending.drain(..cut);
                        return visible;
                    }
                }
            }
        }
    }

    /// Drain any held-back visible text at end of stream.
    pub fn flush(&mut self) -> String {
        if self.in_think {
            // Unterminated reasoning block; nothing visible remains.
            self.pending.clear();
            return String::new();
        }
        std::mem::take(&mut self.pending)
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    for len in (1..=max).rev() {
        if !text.is_char_boundary(text.len() - len) {
            continue;
        }
        if marker.starts_with(&text[text.len() - len..]) {
            return len;
        }
    }
    0
}

/// Merge newly seen citations into an accumulator, first-seen order, no
/// duplicates.
pub(crate) fn merge_citations(accumulated: &mut Vec<String>, incoming: Vec<String>) {
    for url in incoming {
        if !accumulated.iter().any(|seen| *seen == url) {
            accumulated.push(url);
        }
    }
}
