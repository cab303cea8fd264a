//! Error Handling Module
//!
//! Defines the error taxonomy for the answer engine: configuration and
//! session-state errors fail fast, provider errors are classified into
//! retryable and terminal classes, and best-effort sub-operations
//! (prompt augmentation, citation extraction) never surface here at all.

use thiserror::Error;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error, Clone)]
pub enum AuxKnowError {
    /// Invalid configuration value (e.g. a zero paragraph count).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation attempted on a session that has been closed.
    #[error("cannot use a closed session")]
    SessionClosed,

    /// No session registered under the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Missing or rejected credentials. Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-success HTTP status from the model provider.
    #[error("provider API error {code}: {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error body or canonical reason
        message: String,
    },

    /// Provider asked us to slow down (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Failed to reach the provider at all.
    #[error("connection error: {0}")]
    Connection(String),

    /// The bounded request timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The provider replied with a body we could not interpret.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// A streaming response failed mid-flight.
    #[error("stream error: {0}")]
    Stream(String),

    /// Invariant violation inside the engine itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classification, mainly for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input from the caller (configuration, closed session, ...)
    Caller,
    /// Credentials problem
    Auth,
    /// Provider rejected the request (4xx)
    Client,
    /// Provider-side failure (5xx, rate limits)
    Server,
    /// Transport-level failure
    Network,
    /// Bug or broken invariant in the engine
    Internal,
}

impl AuxKnowError {
    /// Whether the primary ask path should retry after this error.
    ///
    /// Retries cover transient transport failures, rate limits, and
    /// 5xx-class provider errors. Everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Connection(_) | Self::Timeout(_) => true,
            Self::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Classify this error into a coarse category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::SessionClosed | Self::SessionNotFound(_) => {
                ErrorCategory::Caller
            }
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Api { code, .. } if *code >= 500 => ErrorCategory::Server,
            Self::Api { .. } | Self::MalformedResponse(_) => ErrorCategory::Client,
            Self::RateLimited(_) => ErrorCategory::Server,
            Self::Connection(_) | Self::Timeout(_) | Self::Stream(_) => ErrorCategory::Network,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<reqwest::Error> for AuxKnowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AuxKnowError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}
