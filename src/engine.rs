//! Answer Engine
//!
//! The [`AuxKnow`] engine is the crate's entry point. It owns the
//! provider clients, the live instance configuration, and the session
//! registry, and drives the full ask pipeline: resolve the effective
//! per-call configuration, optionally restructure the query, pick a
//! model, attach context, optionally augment the prompt, dispatch with
//! retries, and post-process the answer.
//!
//! Engines are cheap to clone; clones share the same inner state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use secrecy::SecretString;
use uuid::Uuid;

use crate::augment;
use crate::citations::{self, dedup_citations};
use crate::config::{AskOptions, ConfigUpdate, EffectiveConfig, EngineConfig};
use crate::context::DEFAULT_CONTEXT_TOKEN_BUDGET;
use crate::error::AuxKnowError;
use crate::prompts;
use crate::provider::http::{DEFAULT_REQUEST_TIMEOUT, HttpProvider};
use crate::provider::{ChatMessage, ChatRequest, ModelProvider};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::routing;
use crate::session::Session;
use crate::streaming::{self, AnswerStream, ThinkBlockFilter, clean_answer};
use crate::types::Answer;

/// Environment variable consulted for the Perplexity API key when no
/// explicit key is given to the builder.
pub const ENV_PERPLEXITY_API_KEY: &str = "PERPLEXITY_API_KEY";
/// Environment variable consulted for the OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub(crate) struct EngineInner {
    config: RwLock<EngineConfig>,
    sessions: Mutex<HashMap<String, Weak<Session>>>,
    pub(crate) search_provider: Arc<dyn ModelProvider>,
    pub(crate) auxiliary_provider: Arc<dyn ModelProvider>,
    pub(crate) retry: RetryPolicy,
    pub(crate) context_token_budget: usize,
}

impl EngineInner {
    pub(crate) fn config_snapshot(&self) -> EngineConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn deregister_session(&self, session_id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
    }
}

/// The answer engine.
#[derive(Clone)]
pub struct AuxKnow {
    inner: Arc<EngineInner>,
}

impl AuxKnow {
    /// Start building an engine.
    pub fn builder() -> AuxKnowBuilder {
        AuxKnowBuilder::new()
    }

    /// Crate version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Current instance configuration.
    pub fn get_config(&self) -> EngineConfig {
        self.inner.config_snapshot()
    }

    /// Apply a partial configuration update to the instance.
    ///
    /// Zero-valued length fields are rejected; values above the allowed
    /// maximum are clamped back to the defaults with a warning. Updates
    /// affect subsequent asks only, never in-flight requests.
    pub fn set_config(&self, update: ConfigUpdate) -> Result<(), AuxKnowError> {
        self.inner
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .apply(update)
    }

    /// Ask a one-shot question with default options.
    pub async fn ask(&self, question: &str) -> Result<Answer, AuxKnowError> {
        self.ask_with(question, AskOptions::default()).await
    }

    /// Ask a one-shot question with explicit call-site overrides.
    pub async fn ask_with(
        &self,
        question: &str,
        options: AskOptions,
    ) -> Result<Answer, AuxKnowError> {
        ask_inner(&self.inner, question, options).await
    }

    /// Ask with a streamed response: partial chunks followed by exactly
    /// one final answer carrying the full cleaned text and citations.
    pub async fn ask_stream(&self, question: &str) -> Result<AnswerStream, AuxKnowError> {
        self.ask_stream_with(question, AskOptions::default()).await
    }

    /// Streamed ask with explicit call-site overrides.
    pub async fn ask_stream_with(
        &self,
        question: &str,
        options: AskOptions,
    ) -> Result<AnswerStream, AuxKnowError> {
        ask_stream_inner(&self.inner, question, options, None).await
    }

    /// Create a new session registered with this engine.
    pub fn create_session(&self) -> Arc<Session> {
        let session = Session::create(Arc::clone(&self.inner));
        let mut sessions = self
            .inner
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.retain(|_, weak| weak.strong_count() > 0);
        sessions.insert(session.id().to_string(), Arc::downgrade(&session));
        tracing::debug!(session_id = %session.id(), "session created");
        session
    }

    /// Look up a live session by id.
    pub fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(session_id)
            .and_then(Weak::upgrade)
    }

    /// Look up a session, failing when it is unknown or already gone.
    pub fn require_session(&self, session_id: &str) -> Result<Arc<Session>, AuxKnowError> {
        self.get_session(session_id)
            .ok_or_else(|| AuxKnowError::SessionNotFound(session_id.to_string()))
    }

    /// Extract citation URLs backing an already-produced response.
    ///
    /// Best effort: provider failures surface as an empty citation list
    /// with the error recorded on the outcome, never as an `Err`.
    pub async fn get_citations(
        &self,
        query: &str,
        response_text: &str,
    ) -> citations::CitationOutcome {
        citations::extract(self.inner.search_provider.as_ref(), query, response_text).await
    }
}

struct PreparedRequest {
    answer_id: String,
    request: ChatRequest,
    effective: EffectiveConfig,
}

fn log_elapsed(enabled: bool, operation: &str, started: Instant) {
    if enabled {
        tracing::debug!(
            operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "operation timed"
        );
    }
}

/// Run the pre-dispatch pipeline: resolve configuration, restructure the
/// query, pick a model, and assemble the chat request.
async fn prepare_request(
    inner: &EngineInner,
    question: &str,
    options: &AskOptions,
) -> PreparedRequest {
    let base = inner.config_snapshot();
    let effective = EffectiveConfig::resolve(&base, options);
    let started = Instant::now();

    let mut question = question.to_string();
    if effective.auto_query_restructuring {
        question =
            augment::restructure_query(inner.auxiliary_provider.as_ref(), &question).await;
    }

    // Explicit mode flags take precedence over LLM-assisted routing.
    let model = if !routing::mode_flag_set(&effective) && effective.auto_model_routing {
        routing::route_with_auxiliary(
            inner.auxiliary_provider.as_ref(),
            &question,
            effective.enable_unbiased_reasoning,
        )
        .await
    } else {
        routing::select_model(&effective)
    };
    tracing::debug!(model = %model, "model selected");

    let context = options.context.clone().unwrap_or_default();
    let mut user_prompt = prompts::user_ask_prompt(
        &question,
        effective.answer_length_in_paragraphs,
        effective.lines_per_paragraph,
        effective.deep_research,
        &context,
    );
    if effective.auto_prompt_augment {
        let segment =
            augment::augmentation_segment(inner.auxiliary_provider.as_ref(), &question, &context)
                .await;
        user_prompt = augment::apply_segment(user_prompt, &segment);
    }

    let request = ChatRequest::new(
        model,
        vec![
            ChatMessage::system(prompts::system_prompt()),
            ChatMessage::user(user_prompt),
        ],
    );
    log_elapsed(effective.performance_logging_enabled, "prepare", started);

    PreparedRequest {
        answer_id: Uuid::new_v4().to_string(),
        request,
        effective,
    }
}

pub(crate) async fn ask_inner(
    inner: &Arc<EngineInner>,
    question: &str,
    options: AskOptions,
) -> Result<Answer, AuxKnowError> {
    let started = Instant::now();
    let prepared = prepare_request(inner, question, &options).await;

    let executor = RetryExecutor::new(inner.retry.clone());
    let output = executor
        .execute(|| {
            let provider = Arc::clone(&inner.search_provider);
            let request = prepared.request.clone();
            async move { provider.complete(request).await }
        })
        .await?;

    let text = clean_answer(&output.text);
    let mut citations = dedup_citations(output.citations);
    if citations.is_empty() && prepared.effective.for_citations {
        citations = citations::extract(inner.search_provider.as_ref(), question, &text)
            .await
            .citations;
    }
    log_elapsed(prepared.effective.performance_logging_enabled, "ask", started);

    Ok(Answer::final_answer(&prepared.answer_id, text, citations))
}

pub(crate) async fn ask_stream_inner(
    inner: &Arc<EngineInner>,
    question: &str,
    options: AskOptions,
    session: Option<Arc<Session>>,
) -> Result<AnswerStream, AuxKnowError> {
    let started = Instant::now();
    let prepared = prepare_request(inner, question, &options).await;

    let executor = RetryExecutor::new(inner.retry.clone());
    let chunks = executor
        .execute(|| {
            let provider = Arc::clone(&inner.search_provider);
            let request = prepared.request.clone();
            async move { provider.complete_stream(request).await }
        })
        .await?;

    let inner = Arc::clone(inner);
    let question = question.to_string();
    let answer_id = prepared.answer_id;
    let effective = prepared.effective;

    let stream = async_stream::try_stream! {
        let mut chunks = chunks;
        let mut filter = ThinkBlockFilter::default();
        let mut full_text = String::new();
        let mut citations: Vec<String> = Vec::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            streaming::merge_citations(&mut citations, chunk.citations);
            let visible = filter.push(&chunk.delta);
            if !visible.is_empty() {
                full_text.push_str(&visible);
                yield Answer::partial(&answer_id, visible, citations.clone());
            }
        }
        full_text.push_str(&filter.flush());

        let text = clean_answer(&full_text);
        if citations.is_empty() && effective.for_citations {
            citations = citations::extract(inner.search_provider.as_ref(), &question, &text)
                .await
                .citations;
        }
        if let Some(session) = &session {
            session.record_exchange(&question, &text);
        }
        log_elapsed(effective.performance_logging_enabled, "ask_stream", started);

        yield Answer::final_answer(&answer_id, text, citations);
    };

    Ok(Box::pin(stream))
}

/// Builder for [`AuxKnow`].
///
/// API keys fall back to `PERPLEXITY_API_KEY` and `OPENAI_API_KEY` when
/// not set explicitly; injected providers skip key resolution entirely.
pub struct AuxKnowBuilder {
    perplexity_api_key: Option<SecretString>,
    openai_api_key: Option<SecretString>,
    config: EngineConfig,
    retry: RetryPolicy,
    request_timeout: Duration,
    context_token_budget: usize,
    search_provider: Option<Arc<dyn ModelProvider>>,
    auxiliary_provider: Option<Arc<dyn ModelProvider>>,
}

impl Default for AuxKnowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuxKnowBuilder {
    pub fn new() -> Self {
        Self {
            perplexity_api_key: None,
            openai_api_key: None,
            config: EngineConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            context_token_budget: DEFAULT_CONTEXT_TOKEN_BUDGET,
            search_provider: None,
            auxiliary_provider: None,
        }
    }

    /// Perplexity API key for the primary search provider.
    pub fn perplexity_api_key(mut self, key: impl Into<String>) -> Self {
        self.perplexity_api_key = Some(SecretString::from(key.into()));
        self
    }

    /// OpenAI API key for the auxiliary model.
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Initial instance configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy applied to primary provider dispatches.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Token budget for per-session context logs.
    pub fn context_token_budget(mut self, budget: usize) -> Self {
        self.context_token_budget = budget;
        self
    }

    /// Replace the primary search provider. Intended for tests and
    /// self-hosted gateways.
    pub fn search_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.search_provider = Some(provider);
        self
    }

    /// Replace the auxiliary provider used for routing, restructuring,
    /// and augmentation.
    pub fn auxiliary_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.auxiliary_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<AuxKnow, AuxKnowError> {
        let search_provider: Arc<dyn ModelProvider> = match self.search_provider {
            Some(provider) => provider,
            None => {
                let key = resolve_key(self.perplexity_api_key, ENV_PERPLEXITY_API_KEY)?;
                Arc::new(HttpProvider::perplexity(key, self.request_timeout)?)
            }
        };
        let auxiliary_provider: Arc<dyn ModelProvider> = match self.auxiliary_provider {
            Some(provider) => provider,
            None => {
                let key = resolve_key(self.openai_api_key, ENV_OPENAI_API_KEY)?;
                Arc::new(HttpProvider::openai(key, self.request_timeout)?)
            }
        };

        Ok(AuxKnow {
            inner: Arc::new(EngineInner {
                config: RwLock::new(self.config),
                sessions: Mutex::new(HashMap::new()),
                search_provider,
                auxiliary_provider,
                retry: self.retry,
                context_token_budget: self.context_token_budget,
            }),
        })
    }
}

fn resolve_key(
    explicit: Option<SecretString>,
    env_var: &str,
) -> Result<SecretString, AuxKnowError> {
    if let Some(key) = explicit {
        return Ok(key);
    }
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => Err(AuxKnowError::Configuration(format!(
            "API key not provided and {env_var} is not set"
        ))),
    }
}
