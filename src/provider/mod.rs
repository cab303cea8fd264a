//! Model Provider Seam
//!
//! The engine talks to its upstream LLM APIs exclusively through the
//! [`ModelProvider`] trait: one request/response call and one
//! server-streaming call. The production implementation is the
//! OpenAI-compatible [`http::HttpProvider`]; tests inject scripted
//! implementations.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::AuxKnowError;
use crate::routing::ModelId;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in an outgoing chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Outbound request payload for a single model call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: ModelId,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Build a request for the given model and messages.
    pub fn new(model: ModelId, messages: Vec<ChatMessage>) -> Self {
        Self {
            model,
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the response length in tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Complete (non-streamed) output of a model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOutput {
    /// Generated text.
    pub text: String,
    /// Source citations reported natively by the provider, if any.
    pub citations: Vec<String>,
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Incremental text delta. May be empty on citation-only events.
    pub delta: String,
    /// Citations attached to this event, if any.
    pub citations: Vec<String>,
}

/// Stream of raw provider chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AuxKnowError>> + Send>>;

/// External collaborator supplying text generation and citations.
///
/// Implementations must be cheap to call concurrently; the engine clones
/// them behind `Arc` and drives one sequential pipeline per request.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Issue a request and wait for the complete response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatOutput, AuxKnowError>;

    /// Issue a request and return the response as a stream of chunks.
    ///
    /// Dropping the returned stream abandons the response; no explicit
    /// cancel signal is sent upstream beyond closing the connection.
    async fn complete_stream(&self, request: ChatRequest) -> Result<ChunkStream, AuxKnowError>;
}
