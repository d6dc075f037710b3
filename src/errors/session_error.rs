use thiserror::Error;

/// Faults that end a session.
///
/// Generation failures are deliberately absent: they are recovered inside the
/// session by substituting the fallback reply and never close a connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Client went away or a frame could not be delivered
    #[error("Transport fault: {0}")]
    Transport(String),

    /// Client sent something the text protocol does not allow
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Operation not allowed in the session's current state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Any other fault raised while processing a message
    #[error("Unexpected fault: {0}")]
    Unexpected(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Short machine-readable tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
            Self::InvalidState(_) => "invalid_state",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
