//! Bounded prompt construction.
//!
//! The backend never sees the whole transcript: every request carries one
//! system directive followed by the most recent [`CONTEXT_WINDOW_TURNS`]
//! turns. The window is derived on demand and never stored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::transcript::{Speaker, Transcript, Turn};

/// Number of transcript turns (3 user/assistant pairs) sent with each request.
pub const CONTEXT_WINDOW_TURNS: usize = 6;

/// Role of a message sent to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<Speaker> for ChatRole {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::User => ChatRole::User,
            Speaker::Assistant => ChatRole::Assistant,
        }
    }
}

/// One entry of a context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self::new(turn.role().into(), turn.content())
    }
}

/// Builds the message list sent to the backend for a transcript.
///
/// Cheap to clone: the directive is shared between all sessions.
#[derive(Debug, Clone)]
pub struct ContextWindowBuilder {
    system_directive: Arc<str>,
}

impl ContextWindowBuilder {
    pub fn new(system_directive: impl Into<Arc<str>>) -> Self {
        Self {
            system_directive: system_directive.into(),
        }
    }

    pub fn system_directive(&self) -> &str {
        &self.system_directive
    }

    /// Build the window: the directive, then `transcript.recent(6)` role for role.
    ///
    /// An empty transcript yields a window holding only the directive.
    pub fn build(&self, transcript: &Transcript) -> Vec<ChatMessage> {
        let recent = transcript.recent(CONTEXT_WINDOW_TURNS);
        let mut window = Vec::with_capacity(1 + recent.len());
        window.push(ChatMessage::system(&*self.system_directive));
        window.extend(recent.iter().map(ChatMessage::from));
        window
    }
}
