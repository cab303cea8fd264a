//! Configuration Module
//!
//! Instance-level engine configuration, partial configuration updates, and
//! the per-call configuration resolver. The resolver merges call-site
//! overrides over the instance configuration into an immutable
//! [`EffectiveConfig`] snapshot; nothing downstream reads the live
//! configuration mid-request.

use serde::{Deserialize, Serialize};

use crate::error::AuxKnowError;

/// Default target paragraph count for answers.
pub const DEFAULT_ANSWER_LENGTH_PARAGRAPHS: u32 = 3;
/// Default target lines per paragraph.
pub const DEFAULT_LINES_PER_PARAGRAPH: u32 = 5;
/// Upper bound on answer length; larger requests are clamped back to the default.
pub const MAX_ANSWER_LENGTH_PARAGRAPHS: u32 = 8;
/// Upper bound on lines per paragraph; larger requests are clamped back to the default.
pub const MAX_LINES_PER_PARAGRAPH: u32 = 10;

/// Instance-scoped engine configuration.
///
/// Created with defaults at client construction, mutated only through
/// [`EngineConfig::apply`], and read as a whole snapshot per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pick the model variant automatically when no mode flag is set.
    pub auto_model_routing: bool,
    /// Rewrite incoming questions for better answer quality.
    pub auto_query_restructuring: bool,
    /// Target number of paragraphs in answers (>= 1).
    pub answer_length_in_paragraphs: u32,
    /// Target number of lines per paragraph (>= 1).
    pub lines_per_paragraph: u32,
    /// Enrich the outgoing prompt with an auxiliary supporting segment.
    pub auto_prompt_augment: bool,
    /// Prefer the uncensored/neutral model variant for reasoning requests.
    pub enable_unbiased_reasoning: bool,
    /// Request the reasoning-tuned model variant by default.
    pub enable_reasoning: bool,
    /// Prioritize latency: suppresses routing, restructuring, and augmentation.
    pub fast_mode: bool,
    /// Emit per-operation timing logs.
    pub performance_logging_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_model_routing: true,
            auto_query_restructuring: false,
            answer_length_in_paragraphs: DEFAULT_ANSWER_LENGTH_PARAGRAPHS,
            lines_per_paragraph: DEFAULT_LINES_PER_PARAGRAPH,
            auto_prompt_augment: true,
            enable_unbiased_reasoning: true,
            enable_reasoning: false,
            fast_mode: false,
            performance_logging_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Merge a partial update into this configuration.
    ///
    /// Only the fields present in `update` change. Non-positive length
    /// settings are rejected with [`AuxKnowError::Configuration`]; values
    /// above the documented maxima are clamped back to the default with a
    /// warning, matching the documented limits.
    pub fn apply(&mut self, update: ConfigUpdate) -> Result<(), AuxKnowError> {
        if let Some(paragraphs) = update.answer_length_in_paragraphs {
            self.answer_length_in_paragraphs = validate_length(
                paragraphs,
                MAX_ANSWER_LENGTH_PARAGRAPHS,
                DEFAULT_ANSWER_LENGTH_PARAGRAPHS,
                "answer_length_in_paragraphs",
            )?;
        }
        if let Some(lines) = update.lines_per_paragraph {
            self.lines_per_paragraph = validate_length(
                lines,
                MAX_LINES_PER_PARAGRAPH,
                DEFAULT_LINES_PER_PARAGRAPH,
                "lines_per_paragraph",
            )?;
        }
        if let Some(v) = update.auto_model_routing {
            self.auto_model_routing = v;
        }
        if let Some(v) = update.auto_query_restructuring {
            self.auto_query_restructuring = v;
        }
        if let Some(v) = update.auto_prompt_augment {
            self.auto_prompt_augment = v;
        }
        if let Some(v) = update.enable_unbiased_reasoning {
            self.enable_unbiased_reasoning = v;
        }
        if let Some(v) = update.enable_reasoning {
            self.enable_reasoning = v;
        }
        if let Some(v) = update.fast_mode {
            self.fast_mode = v;
        }
        if let Some(v) = update.performance_logging_enabled {
            self.performance_logging_enabled = v;
        }
        Ok(())
    }
}

fn validate_length(
    value: u32,
    max: u32,
    default: u32,
    field: &str,
) -> Result<u32, AuxKnowError> {
    if value == 0 {
        return Err(AuxKnowError::Configuration(format!(
            "{field} must be at least 1"
        )));
    }
    if value > max {
        tracing::warn!(field, value, max, default, "value above maximum, clamping to default");
        return Ok(default);
    }
    Ok(value)
}

/// Partial configuration update: every field is optional, absent fields
/// leave the current value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub auto_model_routing: Option<bool>,
    pub auto_query_restructuring: Option<bool>,
    pub answer_length_in_paragraphs: Option<u32>,
    pub lines_per_paragraph: Option<u32>,
    pub auto_prompt_augment: Option<bool>,
    pub enable_unbiased_reasoning: Option<bool>,
    pub enable_reasoning: Option<bool>,
    pub fast_mode: Option<bool>,
    pub performance_logging_enabled: Option<bool>,
}

/// Call-site overrides for a single `ask`/`ask_stream` invocation.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Route to the deep-research model variant.
    pub deep_research: bool,
    /// Prioritize latency over quality for this call only.
    pub fast_mode: bool,
    /// Route to the reasoning model variant.
    pub enable_reasoning: bool,
    /// Enrich the answer with citations, extracting them if the provider
    /// returns none.
    pub for_citations: bool,
    /// Pre-rendered context block; replaces any session context.
    pub context: Option<String>,
}

impl AskOptions {
    /// Options for a citation-enriched call.
    pub fn citations() -> Self {
        Self {
            for_citations: true,
            ..Self::default()
        }
    }

    /// Options for a latency-prioritized call.
    pub fn fast() -> Self {
        Self {
            fast_mode: true,
            ..Self::default()
        }
    }
}

/// Resolved, immutable per-call configuration.
///
/// Produced once at the start of each request by merging the instance
/// [`EngineConfig`] with the call's [`AskOptions`]; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub deep_research: bool,
    pub fast_mode: bool,
    pub enable_reasoning: bool,
    pub enable_unbiased_reasoning: bool,
    pub for_citations: bool,
    pub auto_model_routing: bool,
    pub auto_query_restructuring: bool,
    pub auto_prompt_augment: bool,
    pub answer_length_in_paragraphs: u32,
    pub lines_per_paragraph: u32,
    pub performance_logging_enabled: bool,
}

impl EffectiveConfig {
    /// Merge instance configuration with call-site overrides.
    ///
    /// Boolean mode flags are OR-merged (an explicit call-site `true` wins
    /// over the instance value; `false` falls back to the instance value).
    /// When the effective fast mode is on it is a total override: model
    /// routing, query restructuring, and prompt augmentation are forced off
    /// for the call regardless of their resolved values.
    pub fn resolve(base: &EngineConfig, overrides: &AskOptions) -> Self {
        let fast_mode = overrides.fast_mode || base.fast_mode;
        Self {
            deep_research: overrides.deep_research,
            fast_mode,
            enable_reasoning: overrides.enable_reasoning || base.enable_reasoning,
            enable_unbiased_reasoning: base.enable_unbiased_reasoning,
            for_citations: overrides.for_citations,
            auto_model_routing: base.auto_model_routing && !fast_mode,
            auto_query_restructuring: base.auto_query_restructuring && !fast_mode,
            auto_prompt_augment: base.auto_prompt_augment && !fast_mode,
            answer_length_in_paragraphs: base.answer_length_in_paragraphs,
            lines_per_paragraph: base.lines_per_paragraph,
            performance_logging_enabled: base.performance_logging_enabled,
        }
    }
}
