//! Chat WebSocket message types
//!
//! Inbound frames are plain text: each text frame is one utterance. Outbound
//! frames are JSON objects tagged by `type`.

use serde::Serialize;

use crate::core::conversation::Turn;
use crate::core::session::TurnReply;

/// Outgoing WebSocket messages to the client
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ChatOutgoingMessage {
    /// Reply to one utterance plus the whole conversation so far
    #[serde(rename = "audio_response")]
    AudioResponse {
        text: String,
        history_snapshot: Vec<Turn>,
    },
}

impl From<TurnReply> for ChatOutgoingMessage {
    fn from(reply: TurnReply) -> Self {
        Self::AudioResponse {
            text: reply.text,
            history_snapshot: reply.history_snapshot,
        }
    }
}

/// Routing for the socket's sender task
#[derive(Debug)]
pub enum ChatMessageRoute {
    Outgoing(ChatOutgoingMessage),
    Close,
}
