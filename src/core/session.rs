//! Per-connection conversation session.
//!
//! A [`Session`] owns its [`Transcript`] exclusively and processes one
//! utterance at a time:
//!
//! ```text
//! Connecting --activate--> Active --begin_turn--> Generating --complete_turn--> Active
//!                            |                        |
//!                            +--------close-----------+------> Closed (terminal)
//! ```
//!
//! Splitting a cycle into `begin_turn` / `complete_turn` lets the transport
//! race the backend call against a disconnect and simply drop the pending
//! reply when the connection goes away first.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::conversation::{ChatMessage, ContextWindowBuilder, Transcript, Turn};
use crate::core::llm::{BaseGenerator, GenerationResult, generate_with_timeout};
use crate::errors::{SessionError, SessionResult};

/// Reply substituted for the assistant turn when generation fails.
pub const FALLBACK_REPLY: &str = "I apologize, I'm having trouble processing that right now.";

// =============================================================================
// Identity and State
// =============================================================================

/// Opaque handle identifying one connection's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet accepting messages
    Connecting,
    /// Waiting for the next inbound message
    Active,
    /// A backend call is in flight for the latest user turn
    Generating,
    /// Terminal
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Generating => "generating",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Result of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// Assistant text delivered to the client
    pub text: String,
    /// Full transcript at the moment the reply was appended
    pub history_snapshot: Vec<Turn>,
    /// True when `text` is the fallback rather than a backend reply
    pub fallback: bool,
}

// =============================================================================
// Session
// =============================================================================

/// Conversation state for one live connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    transcript: Transcript,
    context: ContextWindowBuilder,
}

impl Session {
    pub fn new(id: SessionId, context: ContextWindowBuilder) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            transcript: Transcript::new(),
            context,
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// `Connecting -> Active`, once the connection has been accepted.
    pub fn activate(&mut self) -> SessionResult<()> {
        self.expect_state(SessionState::Connecting, "activate")?;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Record the user's utterance and return the context window to send.
    pub fn begin_turn(&mut self, utterance: impl Into<String>) -> SessionResult<Vec<ChatMessage>> {
        self.expect_state(SessionState::Active, "begin a turn")?;

        let utterance = utterance.into();
        debug!(session_id = %self.id, "User: {}", utterance);
        self.transcript.append(Turn::user(utterance));
        self.state = SessionState::Generating;

        Ok(self.context.build(&self.transcript))
    }

    /// Record the assistant turn for the pending utterance.
    ///
    /// A backend failure is logged and replaced with [`FALLBACK_REPLY`]; it
    /// never fails the session.
    pub fn complete_turn(&mut self, outcome: GenerationResult<String>) -> SessionResult<TurnReply> {
        self.expect_state(SessionState::Generating, "complete a turn")?;

        let (text, fallback) = match outcome {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Generation failed, using fallback reply");
                (FALLBACK_REPLY.to_string(), true)
            }
        };

        debug!(session_id = %self.id, "AI: {}", text);
        self.transcript.append(Turn::assistant(text.clone()));
        self.state = SessionState::Active;

        Ok(TurnReply {
            text,
            history_snapshot: self.transcript.turns().to_vec(),
            fallback,
        })
    }

    /// Run a full cycle: append the user turn, call the backend (bounded by
    /// `timeout`), append the assistant turn.
    pub async fn handle_utterance(
        &mut self,
        utterance: impl Into<String>,
        generator: &dyn BaseGenerator,
        timeout: Duration,
    ) -> SessionResult<TurnReply> {
        let window = self.begin_turn(utterance)?;
        let outcome = generate_with_timeout(generator, &window, timeout).await;
        self.complete_turn(outcome)
    }

    /// Move to the terminal state. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            debug!(session_id = %self.id, from = %self.state, "Session closed");
            self.state = SessionState::Closed;
        }
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> SessionResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState(format!(
                "cannot {action} while {} (expected {expected})",
                self.state
            )))
        }
    }
}
