//! Citation Extractor
//!
//! Best-effort enrichment of answers with source URLs. Extraction is always
//! consumed as a two-outcome operation: a (possibly empty) citation list
//! plus an error string on provider failure. It never raises, because it
//! never gets to abort a caller's primary request.

use crate::prompts;
use crate::provider::{ChatMessage, ChatRequest, ModelProvider};
use crate::routing::ModelId;

/// Result pair of a citation extraction attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationOutcome {
    /// Deduplicated source URLs, first-seen order. Empty on failure.
    pub citations: Vec<String>,
    /// Provider failure description; `None` on success.
    pub error: Option<String>,
}

/// Deduplicate citations preserving first-seen order.
pub fn dedup_citations(urls: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !out.iter().any(|seen| *seen == url) {
            out.push(url);
        }
    }
    out
}

/// Ask the search provider for citations backing `response_text`.
pub(crate) async fn extract(
    provider: &dyn ModelProvider,
    query: &str,
    response_text: &str,
) -> CitationOutcome {
    let request = ChatRequest::new(
        ModelId::SONAR_PRO,
        vec![
            ChatMessage::system(prompts::system_prompt()),
            ChatMessage::user(prompts::citation_query_prompt(query, response_text)),
        ],
    );

    match provider.complete(request).await {
        Ok(output) => CitationOutcome {
            citations: dedup_citations(output.citations),
            error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, "citation extraction failed");
            CitationOutcome {
                citations: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}
