//! Session Management
//!
//! A session scopes an ordered, bounded context log to a generated id and
//! feeds it into every ask made through it. Sessions are created and
//! looked up by the engine; each session shares the engine's inner state
//! through an `Arc` but is registered only weakly, so dropping all caller
//! handles releases the session.
//!
//! Once closed, every operation fails with
//! [`AuxKnowError::SessionClosed`]; closing is idempotent and there is no
//! reopening.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::config::AskOptions;
use crate::context::{ContextEntry, ContextLog};
use crate::engine::{self, EngineInner};
use crate::error::AuxKnowError;
use crate::streaming::AnswerStream;
use crate::types::Answer;

/// A stateful conversation scope with bounded context tracking.
pub struct Session {
    session_id: String,
    closed: AtomicBool,
    context: Mutex<ContextLog>,
    engine: Arc<EngineInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    pub(crate) fn create(engine: Arc<EngineInner>) -> Arc<Self> {
        Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            closed: AtomicBool::new(false),
            context: Mutex::new(ContextLog::new(engine.context_token_budget)),
            engine,
        })
    }

    /// Unique identifier of this session.
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Whether this session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), AuxKnowError> {
        if self.is_closed() {
            return Err(AuxKnowError::SessionClosed);
        }
        Ok(())
    }

    fn lock_context(&self) -> MutexGuard<'_, ContextLog> {
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the stored context entries, oldest first.
    pub fn context_snapshot(&self) -> Result<Vec<ContextEntry>, AuxKnowError> {
        self.ensure_open()?;
        Ok(self.lock_context().snapshot())
    }

    /// Serialized context block as it would be attached to the next ask.
    pub fn render_context(&self) -> Result<String, AuxKnowError> {
        self.ensure_open()?;
        Ok(self.lock_context().render())
    }

    /// Clear all context entries; the session stays open.
    pub fn reset_context(&self) -> Result<(), AuxKnowError> {
        self.ensure_open()?;
        self.lock_context().reset();
        Ok(())
    }

    /// Append a confirmed exchange to the context log.
    ///
    /// Called only after a final answer; a session closed mid-flight simply
    /// drops the exchange.
    pub(crate) fn record_exchange(&self, question: &str, answer: &str) {
        if self.is_closed() {
            return;
        }
        self.lock_context().append(question, answer);
    }

    /// Ask a question within this session, grounding it on the session
    /// context and appending the exchange after completion.
    pub async fn ask(&self, question: &str) -> Result<Answer, AuxKnowError> {
        self.ask_with(question, AskOptions::default()).await
    }

    /// Ask with explicit call-site overrides.
    pub async fn ask_with(
        &self,
        question: &str,
        mut options: AskOptions,
    ) -> Result<Answer, AuxKnowError> {
        self.ensure_open()?;
        if options.context.is_none() {
            options.context = Some(self.lock_context().render());
        }
        let answer = engine::ask_inner(&self.engine, question, options).await?;
        self.record_exchange(question, &answer.answer);
        Ok(answer)
    }

    /// Ask within this session with a streamed response.
    pub async fn ask_stream(self: &Arc<Self>, question: &str) -> Result<AnswerStream, AuxKnowError> {
        self.ask_stream_with(question, AskOptions::default()).await
    }

    /// Streamed ask with explicit call-site overrides. The exchange is
    /// appended to the session context only once the final chunk is
    /// produced.
    pub async fn ask_stream_with(
        self: &Arc<Self>,
        question: &str,
        mut options: AskOptions,
    ) -> Result<AnswerStream, AuxKnowError> {
        self.ensure_open()?;
        if options.context.is_none() {
            options.context = Some(self.lock_context().render());
        }
        engine::ask_stream_inner(&self.engine, question, options, Some(Arc::clone(self))).await
    }

    /// Close this session and deregister it from the engine.
    ///
    /// Idempotent; all subsequent operations fail with `SessionClosed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.deregister_session(&self.session_id);
        tracing::debug!(session_id = %self.session_id, "session closed");
    }
}
