//! HTTP Model Provider
//!
//! OpenAI-compatible `/chat/completions` client used for both the
//! search-grounded provider (Perplexity) and the general-purpose auxiliary
//! provider (OpenAI). Non-streaming calls return one parsed body;
//! streaming calls decode SSE events with `eventsource-stream` and yield
//! text deltas plus any citations the provider attaches to events.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::AuxKnowError;
use crate::provider::{ChatOutput, ChatRequest, ChunkStream, ModelProvider, StreamChunk};

/// Perplexity API base URL.
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
/// OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default bound on a single non-streaming provider request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Bound on establishing a connection, for both call paths.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const SSE_DONE_MARKER: &str = "[DONE]";

/// HTTP-backed [`ModelProvider`] for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl HttpProvider {
    /// Create a provider for an arbitrary OpenAI-compatible base URL.
    ///
    /// `timeout` bounds non-streaming requests end to end. Streaming
    /// responses are only bounded while connecting; consuming the stream
    /// itself carries no overall deadline.
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, AuxKnowError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AuxKnowError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
            timeout,
        })
    }

    /// Provider pointed at the Perplexity API.
    pub fn perplexity(api_key: SecretString, timeout: Duration) -> Result<Self, AuxKnowError> {
        Self::new(PERPLEXITY_BASE_URL, api_key, timeout)
    }

    /// Provider pointed at the OpenAI API.
    pub fn openai(api_key: SecretString, timeout: Duration) -> Result<Self, AuxKnowError> {
        Self::new(OPENAI_BASE_URL, api_key, timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AuxKnowError> {
        let mut body = serde_json::to_value(request)?;
        body["stream"] = serde_json::Value::Bool(stream);

        let mut builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        if stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        } else {
            // A whole-request deadline would keep ticking while a caller
            // drains a long-lived SSE body, so it only applies here.
            builder = builder.timeout(self.timeout);
        }

        let response = builder.send().await.map_err(AuxKnowError::from)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(classify_status(status.as_u16(), message))
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn classify_status(code: u16, message: String) -> AuxKnowError {
    match code {
        401 | 403 => AuxKnowError::Auth(message),
        429 => AuxKnowError::RateLimited(message),
        _ => AuxKnowError::Api { code, message },
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamEvent {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
}

#[derive(Debug, Deserialize, Default)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl ModelProvider for HttpProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutput, AuxKnowError> {
        let response = self.send(&request, false).await?;
        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| AuxKnowError::MalformedResponse(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AuxKnowError::MalformedResponse("response carried no choices".to_string())
            })?;

        Ok(ChatOutput {
            text,
            citations: body.citations,
        })
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<ChunkStream, AuxKnowError> {
        let response = self.send(&request, true).await?;
        let mut events = response.bytes_stream().eventsource();

        let stream = async_stream::try_stream! {
            while let Some(event) = events.next().await {
                let event = event
                    .map_err(|e| AuxKnowError::Stream(format!("SSE decode failed: {e}")))?;
                let data = event.data.trim();
                if data.is_empty() || data == SSE_DONE_MARKER {
                    continue;
                }

                let parsed: WireStreamEvent = serde_json::from_str(data)
                    .map_err(|e| AuxKnowError::MalformedResponse(format!(
                        "bad SSE payload: {e}"
                    )))?;

                let delta = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .unwrap_or_default();

                yield StreamChunk {
                    delta,
                    citations: parsed.citations,
                };
            }
        };

        Ok(Box::pin(stream))
    }
}
