//! Per-session turn log.
//!
//! A [`Transcript`] is the full, append-only history of one connection. It is
//! owned by exactly one session and never shared, so it carries no locking.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Speaker
// =============================================================================

/// Who produced a turn.
///
/// On the client wire the assistant is tagged `"ai"`; the backend uses
/// `"assistant"` (see [`super::ChatRole`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Speaker {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Assistant,
}

impl Speaker {
    /// Tag used in the client-facing history snapshot.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "ai",
        }
    }

    /// Parse a role tag coming from outside the process.
    ///
    /// Accepts `user`, `ai` and `assistant` (case-insensitive). Anything else
    /// is rejected so ad hoc role strings never reach the transcript.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "ai" | "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Speaker::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized speaker role: {raw}")))
    }
}

// =============================================================================
// Turn
// =============================================================================

/// One utterance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Speaker,
    content: String,
}

impl Turn {
    pub fn new(role: Speaker, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, content)
    }

    #[inline]
    pub fn role(&self) -> Speaker {
        self.role
    }

    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }
}

// =============================================================================
// Transcript
// =============================================================================

/// Ordered, append-only log of turns for a single session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn to the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns in original order, or every turn if fewer exist.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Every turn since the session started.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
