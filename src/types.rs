//! Core answer types returned to callers.

use serde::{Deserialize, Serialize};

/// One answer produced by the engine.
///
/// Non-streaming calls return a single final answer. Streaming calls yield
/// a sequence of answers sharing one `id`: partial chunks carry incremental
/// text with `is_final == false`, and exactly one final element carries the
/// full cleaned text together with the aggregated citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Unique identifier for the request that produced this answer.
    pub id: String,
    /// Answer text: incremental for partial chunks, complete for the final one.
    pub answer: String,
    /// Source URLs, deduplicated in first-seen order.
    pub citations: Vec<String>,
    /// True only on the last chunk of a stream or on a non-streamed result.
    pub is_final: bool,
}

impl Answer {
    /// Build a partial streaming chunk.
    pub(crate) fn partial(id: &str, delta: String, citations: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            answer: delta,
            citations,
            is_final: false,
        }
    }

    /// Build a final answer.
    pub(crate) fn final_answer(id: &str, answer: String, citations: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            answer,
            citations,
            is_final: true,
        }
    }
}
