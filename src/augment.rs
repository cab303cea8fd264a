//! Prompt Augmenter
//!
//! Best-effort query restructuring and prompt enrichment through the
//! lightweight auxiliary model. Both operations fall back to their input on
//! any provider failure; augmentation quality degrades silently rather than
//! failing the caller's request.

use crate::prompts;
use crate::provider::{ChatMessage, ChatRequest, ModelProvider};
use crate::routing::ModelId;

const AUGMENTATION_TEMPERATURE: f32 = 0.2;

/// Restate the question for better answer quality.
///
/// Falls back to the original question on any failure or empty reply.
pub(crate) async fn restructure_query(auxiliary: &dyn ModelProvider, question: &str) -> String {
    let request = ChatRequest::new(
        ModelId::GPT_4O_MINI,
        vec![
            ChatMessage::system(prompts::query_restructure_system()),
            ChatMessage::user(prompts::query_restructure_prompt(question)),
        ],
    );

    match auxiliary.complete(request).await {
        Ok(output) => {
            let restructured = output.text.trim();
            if restructured.is_empty() {
                question.to_string()
            } else {
                tracing::debug!(restructured, "query restructured");
                restructured.to_string()
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "query restructuring failed, keeping original");
            question.to_string()
        }
    }
}

/// Produce a supporting segment for the user prompt.
///
/// Returns an empty string on failure; an empty segment leaves the prompt
/// unchanged when combined.
pub(crate) async fn augmentation_segment(
    auxiliary: &dyn ModelProvider,
    question: &str,
    context: &str,
) -> String {
    let request = ChatRequest::new(
        ModelId::GPT_4O_MINI,
        vec![ChatMessage::user(prompts::augmentation_prompt(
            question, context,
        ))],
    )
    .with_temperature(AUGMENTATION_TEMPERATURE);

    match auxiliary.complete(request).await {
        Ok(output) => output.text.trim().to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "prompt augmentation failed, continuing unaugmented");
            String::new()
        }
    }
}

/// Append a non-empty augmentation segment to the user prompt.
pub(crate) fn apply_segment(user_prompt: String, segment: &str) -> String {
    if segment.trim().is_empty() {
        return user_prompt;
    }
    prompts::combine_augmented(&user_prompt, segment)
}
