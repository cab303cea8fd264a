//! AuxKnow: an answer-engine library over search-grounded language models.
//!
//! The crate wraps the Perplexity Sonar model family (with an OpenAI
//! auxiliary model for routing and prompt shaping) behind a single
//! [`AuxKnow`] engine:
//!
//! - One-shot and streamed asks with per-call option overrides
//! - Automatic model routing across the Sonar family, or explicit mode
//!   flags (deep research, reasoning, fast mode)
//! - Optional query restructuring and prompt augmentation through the
//!   auxiliary model, always best effort
//! - Sessions with a bounded, FIFO-evicted conversation context
//! - Citation URLs carried through responses, with an extraction
//!   fallback when a response arrives without any
//!
//! # Quick start
//!
//! ```rust,no_run
//! use auxknow::{AskOptions, AuxKnow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), auxknow::AuxKnowError> {
//!     let engine = AuxKnow::builder()
//!         .perplexity_api_key("pplx-...")
//!         .openai_api_key("sk-...")
//!         .build()?;
//!
//!     let answer = engine.ask("What is the speed of light?").await?;
//!     println!("{}", answer.answer);
//!
//!     let session = engine.create_session();
//!     session.ask("Who discovered penicillin?").await?;
//!     let followup = session
//!         .ask_with("When was that?", AskOptions::citations())
//!         .await?;
//!     println!("{:?}", followup.citations);
//!     session.close();
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

mod augment;
mod prompts;

pub mod citations;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod provider;
pub mod retry;
pub mod routing;
pub mod session;
pub mod streaming;
pub mod types;

pub use citations::CitationOutcome;
pub use config::{AskOptions, ConfigUpdate, EngineConfig};
pub use engine::{AuxKnow, AuxKnowBuilder};
pub use error::{AuxKnowError, ErrorCategory};
pub use session::Session;
pub use streaming::AnswerStream;
pub use types::Answer;

/// Convenience re-exports for typical usage.
pub mod prelude {
    pub use crate::config::{AskOptions, ConfigUpdate, EngineConfig};
    pub use crate::context::ContextEntry;
    pub use crate::engine::{AuxKnow, AuxKnowBuilder};
    pub use crate::error::{AuxKnowError, ErrorCategory};
    pub use crate::provider::{ChatMessage, ChatRequest, ModelProvider};
    pub use crate::retry::RetryPolicy;
    pub use crate::routing::ModelId;
    pub use crate::session::Session;
    pub use crate::streaming::AnswerStream;
    pub use crate::types::Answer;
}
