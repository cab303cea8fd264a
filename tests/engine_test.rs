//! End-to-end pipeline tests against scripted providers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;

use auxknow::error::AuxKnowError;
use auxknow::provider::{ChatOutput, ChatRequest, ChunkStream, ModelProvider, StreamChunk};
use auxknow::{Answer, AskOptions, AuxKnow, EngineConfig};

/// Provider that replays scripted responses and records every request.
#[derive(Default)]
struct ScriptedProvider {
    requests: Mutex<Vec<ChatRequest>>,
    responses: Mutex<VecDeque<Result<ChatOutput, AuxKnowError>>>,
    streams: Mutex<VecDeque<Vec<Result<StreamChunk, AuxKnowError>>>>,
}

impl ScriptedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_text(&self, text: &str) {
        self.push_output(ChatOutput {
            text: text.to_string(),
            citations: Vec::new(),
        });
    }

    fn push_output(&self, output: ChatOutput) {
        self.responses.lock().unwrap().push_back(Ok(output));
    }

    fn push_error(&self, err: AuxKnowError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    fn push_stream(&self, chunks: Vec<Result<StreamChunk, AuxKnowError>>) {
        self.streams.lock().unwrap().push_back(chunks);
    }

    fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutput, AuxKnowError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ChatOutput {
                    text: "stub answer".to_string(),
                    citations: Vec::new(),
                })
            })
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<ChunkStream, AuxKnowError> {
        self.requests.lock().unwrap().push(request);
        let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

fn text_chunk(delta: &str) -> Result<StreamChunk, AuxKnowError> {
    Ok(StreamChunk {
        delta: delta.to_string(),
        citations: Vec::new(),
    })
}

/// Configuration with every auxiliary-model feature turned off, so the
/// primary provider sees exactly one request per ask.
fn plain_config() -> EngineConfig {
    EngineConfig {
        auto_model_routing: false,
        auto_prompt_augment: false,
        ..EngineConfig::default()
    }
}

fn engine_with(
    config: EngineConfig,
    search: &Arc<ScriptedProvider>,
    auxiliary: &Arc<ScriptedProvider>,
) -> AuxKnow {
    AuxKnow::builder()
        .config(config)
        .search_provider(Arc::clone(search) as Arc<dyn ModelProvider>)
        .auxiliary_provider(Arc::clone(auxiliary) as Arc<dyn ModelProvider>)
        .build()
        .unwrap()
}

fn user_prompt(request: &ChatRequest) -> &str {
    &request.messages.last().unwrap().content
}

#[tokio::test]
async fn fast_mode_skips_auxiliary_and_routes_to_sonar() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(EngineConfig::default(), &search, &auxiliary);

    search.push_text("quick answer");
    let answer = engine.ask_with("what is rust", AskOptions::fast()).await.unwrap();

    assert!(answer.is_final);
    assert_eq!(answer.answer, "quick answer");
    assert_eq!(auxiliary.request_count(), 0);
    let requests = search.recorded();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model.as_str(), "sonar");
}

#[tokio::test]
async fn auto_routing_uses_the_auxiliary_model_choice() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(EngineConfig::default(), &search, &auxiliary);

    auxiliary.push_text("sonar-pro"); // router verdict
    auxiliary.push_text("relevant background"); // augmentation segment
    search.push_text("routed answer");

    engine.ask("compare two papers in depth").await.unwrap();

    assert_eq!(auxiliary.request_count(), 2);
    // The router verdict call is capped; it only ever needs a model name.
    assert!(auxiliary.recorded()[0].max_tokens.is_some());
    let requests = search.recorded();
    assert_eq!(requests[0].model.as_str(), "sonar-pro");
    assert!(user_prompt(&requests[0]).contains("relevant background"));
}

#[tokio::test]
async fn unknown_router_verdict_falls_back_to_default_model() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let mut config = plain_config();
    config.auto_model_routing = true;
    let engine = engine_with(config, &search, &auxiliary);

    auxiliary.push_text("gpt-5-maximum");
    engine.ask("hello").await.unwrap();

    assert_eq!(search.recorded()[0].model.as_str(), "sonar");
}

#[tokio::test]
async fn reasoning_flag_selects_unbiased_variant() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let options = AskOptions {
        enable_reasoning: true,
        ..AskOptions::default()
    };
    engine.ask_with("is this claim true", options).await.unwrap();

    assert_eq!(search.recorded()[0].model.as_str(), "r1-1776");
    assert_eq!(auxiliary.request_count(), 0);
}

#[tokio::test]
async fn deep_research_flag_selects_deep_research_model() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let options = AskOptions {
        deep_research: true,
        ..AskOptions::default()
    };
    engine.ask_with("survey the field", options).await.unwrap();

    let request = &search.recorded()[0];
    assert_eq!(request.model.as_str(), "sonar-deep-research");
    assert!(user_prompt(request).contains("deep research"));
}

#[tokio::test]
async fn think_blocks_are_stripped_from_final_answers() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_text("<think>internal planning</think>The answer is 42.");
    let answer = engine.ask("meaning of life").await.unwrap();

    assert_eq!(answer.answer, "The answer is 42.");
}

#[tokio::test]
async fn session_context_reaches_the_next_prompt() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let session = engine.create_session();
    search.push_text("Paris is the capital of France.");
    session.ask("capital of France?").await.unwrap();

    search.push_text("About 2.1 million people.");
    session.ask("what is its population?").await.unwrap();

    let requests = search.recorded();
    assert_eq!(requests.len(), 2);
    let second = user_prompt(&requests[1]);
    assert!(second.contains("Q: capital of France?"));
    assert!(second.contains("A: Paris is the capital of France."));
    // The first ask must not have seen any context.
    assert!(!user_prompt(&requests[0]).contains("Context:"));
}

#[tokio::test]
async fn explicit_context_override_replaces_session_context() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let session = engine.create_session();
    search.push_text("first answer");
    session.ask("first question").await.unwrap();

    search.push_text("second answer");
    let options = AskOptions {
        context: Some("pinned facts only".to_string()),
        ..AskOptions::default()
    };
    session.ask_with("second question", options).await.unwrap();

    let second = search.recorded()[1].clone();
    assert!(user_prompt(&second).contains("pinned facts only"));
    assert!(!user_prompt(&second).contains("first question"));
}

#[tokio::test]
async fn context_log_evicts_oldest_when_over_budget() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = AuxKnow::builder()
        .config(plain_config())
        .context_token_budget(10)
        .search_provider(Arc::clone(&search) as Arc<dyn ModelProvider>)
        .auxiliary_provider(Arc::clone(&auxiliary) as Arc<dyn ModelProvider>)
        .build()
        .unwrap();

    let session = engine.create_session();
    // Each exchange is 15 chars, i.e. 4 estimated tokens.
    for (q, a) in [("question1", "answe1"), ("question2", "answe2"), ("question3", "answe3")] {
        search.push_text(a);
        session.ask(q).await.unwrap();
    }

    let snapshot = session.context_snapshot().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].question, "question2");
    assert_eq!(snapshot[1].question, "question3");
}

#[tokio::test]
async fn failed_ask_leaves_session_context_untouched() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let session = engine.create_session();
    search.push_error(AuxKnowError::Auth("bad key".to_string()));
    let err = session.ask("doomed question").await.unwrap_err();

    assert!(matches!(err, AuxKnowError::Auth(_)));
    assert!(session.context_snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn closed_session_rejects_every_operation() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let session = engine.create_session();
    session.close();

    assert!(matches!(
        session.ask("anyone there?").await.unwrap_err(),
        AuxKnowError::SessionClosed
    ));
    assert!(matches!(
        session.ask_stream("still there?").await.err().unwrap(),
        AuxKnowError::SessionClosed
    ));
    assert!(session.render_context().is_err());
    assert!(session.reset_context().is_err());
    assert_eq!(search.request_count(), 0);
}

#[tokio::test]
async fn reset_context_clears_entries_but_keeps_the_session_open() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    let session = engine.create_session();
    search.push_text("noted");
    session.ask("remember this").await.unwrap();
    assert_eq!(session.context_snapshot().unwrap().len(), 1);

    session.reset_context().unwrap();
    assert!(session.context_snapshot().unwrap().is_empty());
    assert!(!session.is_closed());
}

#[tokio::test]
async fn auxiliary_failures_degrade_silently() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let mut config = plain_config();
    config.auto_query_restructuring = true;
    config.auto_prompt_augment = true;
    let engine = engine_with(config, &search, &auxiliary);

    // Restructuring and augmentation both fail; the ask must not notice.
    auxiliary.push_error(AuxKnowError::Connection("aux down".to_string()));
    auxiliary.push_error(AuxKnowError::Connection("aux down".to_string()));
    search.push_text("still fine");

    let answer = engine.ask("what is osmosis").await.unwrap();

    assert!(answer.is_final);
    assert_eq!(answer.answer, "still fine");
    assert_eq!(auxiliary.request_count(), 2);
    // The original question survives the failed restructure untouched.
    let requests = search.recorded();
    assert_eq!(requests.len(), 1);
    assert!(user_prompt(&requests[0]).contains("Question: what is osmosis"));
}

#[tokio::test]
async fn citation_extraction_failure_is_reported_structurally() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_error(AuxKnowError::Connection("unreachable".to_string()));
    let outcome = engine.get_citations("some query", "some response").await;

    assert!(outcome.citations.is_empty());
    let reason = outcome.error.expect("failure must be reported");
    assert!(!reason.is_empty());
}

#[tokio::test]
async fn citation_fallback_runs_only_when_natives_are_missing() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    // No native citations: the fallback extraction fires.
    search.push_text("uncited claim");
    search.push_output(ChatOutput {
        text: "sources".to_string(),
        citations: vec![
            "https://a.example".to_string(),
            "https://a.example".to_string(),
            "https://b.example".to_string(),
        ],
    });
    let answer = engine
        .ask_with("needs sources", AskOptions::citations())
        .await
        .unwrap();

    assert_eq!(
        answer.citations,
        vec!["https://a.example".to_string(), "https://b.example".to_string()]
    );
    let requests = search.recorded();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].model.as_str(), "sonar-pro");
}

#[tokio::test]
async fn native_citations_skip_the_fallback() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_output(ChatOutput {
        text: "cited claim".to_string(),
        citations: vec!["https://native.example".to_string()],
    });
    let answer = engine
        .ask_with("needs sources", AskOptions::citations())
        .await
        .unwrap();

    assert_eq!(answer.citations, vec!["https://native.example".to_string()]);
    assert_eq!(search.request_count(), 1);
}

#[tokio::test]
async fn stream_yields_partials_and_exactly_one_final() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_stream(vec![
        text_chunk("Hello "),
        text_chunk("<think>planning"),
        text_chunk(" quietly</think>"),
        Ok(StreamChunk {
            delta: "world".to_string(),
            citations: vec!["https://w.example".to_string()],
        }),
    ]);

    let mut stream = engine.ask_stream("greet me").await.unwrap();
    let mut answers: Vec<Answer> = Vec::new();
    while let Some(item) = stream.next().await {
        answers.push(item.unwrap());
    }

    let finals: Vec<_> = answers.iter().filter(|a| a.is_final).collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].answer, "Hello world");
    assert_eq!(finals[0].citations, vec!["https://w.example".to_string()]);

    let partial_text: String = answers
        .iter()
        .filter(|a| !a.is_final)
        .map(|a| a.answer.as_str())
        .collect();
    assert_eq!(partial_text, "Hello world");
    // Every element of the stream shares the request id.
    assert!(answers.iter().all(|a| a.id == finals[0].id));
}

#[tokio::test]
async fn stream_error_terminates_without_a_final_answer() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_stream(vec![
        text_chunk("partial "),
        Err(AuxKnowError::Stream("connection dropped".to_string())),
    ]);

    let session = engine.create_session();
    let mut stream = session.ask_stream("flaky question").await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_final);
    let second = stream.next().await.unwrap();
    assert!(second.is_err());
    assert!(stream.next().await.is_none());

    // A failed stream must not pollute the session context.
    assert!(session.context_snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn stream_records_the_exchange_after_the_final_chunk() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_stream(vec![text_chunk("streamed "), text_chunk("answer")]);

    let session = engine.create_session();
    let mut stream = session.ask_stream("stream me").await.unwrap();
    while let Some(item) = stream.next().await {
        item.unwrap();
    }

    let snapshot = session.context_snapshot().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].question, "stream me");
    assert_eq!(snapshot[0].answer, "streamed answer");
}

#[tokio::test]
async fn retryable_errors_are_retried_until_success() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = AuxKnow::builder()
        .config(plain_config())
        .retry_policy(
            auxknow::retry::RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(std::time::Duration::from_millis(1))
                .with_jitter(false),
        )
        .search_provider(Arc::clone(&search) as Arc<dyn ModelProvider>)
        .auxiliary_provider(Arc::clone(&auxiliary) as Arc<dyn ModelProvider>)
        .build()
        .unwrap();

    search.push_error(AuxKnowError::RateLimited("slow down".to_string()));
    search.push_error(AuxKnowError::Connection("reset".to_string()));
    search.push_text("third time lucky");

    let answer = engine.ask("persistent question").await.unwrap();
    assert_eq!(answer.answer, "third time lucky");
    assert_eq!(search.request_count(), 3);
}

#[tokio::test]
async fn non_retryable_errors_fail_immediately() {
    let search = ScriptedProvider::new();
    let auxiliary = ScriptedProvider::new();
    let engine = engine_with(plain_config(), &search, &auxiliary);

    search.push_error(AuxKnowError::Auth("bad key".to_string()));
    search.push_text("never reached");

    assert!(engine.ask("forbidden question").await.is_err());
    assert_eq!(search.request_count(), 1);
}
