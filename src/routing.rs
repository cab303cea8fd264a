//! Model Router
//!
//! Selects which named model variant a request goes to. The decision table
//! in [`select_model`] is a pure function over the effective configuration,
//! evaluated in fixed priority order. When automatic routing is enabled and
//! no mode flag forces a choice, [`route_with_auxiliary`] can additionally
//! consult the lightweight auxiliary model; its reply is validated against
//! the known model set and any failure falls back to the default model.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EffectiveConfig;
use crate::prompts;
use crate::provider::{ChatMessage, ChatRequest, ModelProvider};

/// The router replies with a bare model name; anything longer is noise.
const ROUTER_MAX_TOKENS: u32 = 16;

/// Opaque model identifier agreed upon with the model provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(Cow<'static, str>);

impl ModelId {
    /// Default general-purpose search model; also the fast-mode choice.
    pub const SONAR: ModelId = ModelId(Cow::Borrowed("sonar"));
    /// Advanced search model for analytical queries with citations.
    pub const SONAR_PRO: ModelId = ModelId(Cow::Borrowed("sonar-pro"));
    /// Research-oriented model for exhaustive answers.
    pub const SONAR_DEEP_RESEARCH: ModelId = ModelId(Cow::Borrowed("sonar-deep-research"));
    /// Reasoning-tuned model for structured logical output.
    pub const SONAR_REASONING: ModelId = ModelId(Cow::Borrowed("sonar-reasoning"));
    /// Uncensored/neutral reasoning model.
    pub const R1_1776: ModelId = ModelId(Cow::Borrowed("r1-1776"));
    /// Lightweight auxiliary model for restructuring, augmentation, and routing.
    pub const GPT_4O_MINI: ModelId = ModelId(Cow::Borrowed("gpt-4o-mini"));

    /// Build a model id from an arbitrary string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    /// The identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Select the model for a request. First match wins:
///
/// 1. fast mode -> cheapest/fastest model
/// 2. deep research -> research model
/// 3. reasoning -> reasoning model, or the unbiased variant when
///    unbiased reasoning is enabled
/// 4. otherwise -> default model
///
/// Routing is advisory: with no mode flags set this always returns the
/// default model, whether or not automatic routing is enabled.
pub fn select_model(cfg: &EffectiveConfig) -> ModelId {
    if cfg.fast_mode {
        return ModelId::SONAR;
    }
    if cfg.deep_research {
        return ModelId::SONAR_DEEP_RESEARCH;
    }
    if cfg.enable_reasoning {
        if cfg.enable_unbiased_reasoning {
            return ModelId::R1_1776;
        }
        return ModelId::SONAR_REASONING;
    }
    ModelId::SONAR
}

/// Whether any call-site mode flag already fixes the model choice.
pub(crate) fn mode_flag_set(cfg: &EffectiveConfig) -> bool {
    cfg.fast_mode || cfg.deep_research || cfg.enable_reasoning
}

/// Candidate models offered to the auxiliary router.
pub(crate) fn routing_candidates(unbiased: bool) -> Vec<ModelId> {
    let mut candidates = vec![ModelId::SONAR, ModelId::SONAR_PRO];
    if unbiased {
        candidates.push(ModelId::R1_1776);
    }
    candidates
}

/// Ask the auxiliary model which candidate fits the query best.
///
/// Best effort: an unreachable auxiliary provider or an answer outside the
/// candidate set falls back to the default model and is only logged.
pub(crate) async fn route_with_auxiliary(
    auxiliary: &dyn ModelProvider,
    question: &str,
    unbiased: bool,
) -> ModelId {
    let candidates = routing_candidates(unbiased);
    let request = ChatRequest::new(
        ModelId::GPT_4O_MINI,
        vec![
            ChatMessage::system(prompts::model_router_system()),
            ChatMessage::user(prompts::model_router_prompt(question, &candidates)),
        ],
    )
    .with_max_tokens(ROUTER_MAX_TOKENS);

    match auxiliary.complete(request).await {
        Ok(output) => {
            let picked = output.text.trim().to_ascii_lowercase();
            match candidates.iter().find(|m| m.as_str() == picked) {
                Some(model) => model.clone(),
                None => {
                    tracing::warn!(model = %picked, "router returned unknown model, using default");
                    ModelId::SONAR
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "model routing failed, using default");
            ModelId::SONAR
        }
    }
}
