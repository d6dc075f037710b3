//! Conversational chat WebSocket handlers
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Text frames**: one utterance per frame, sent as-is to the conversation
//! - **Binary frames**: not allowed; the session is closed
//!
//! ## Server → Client
//!
//! - **audio_response**: `{"type": "audio_response", "text": ..., "history_snapshot": [...]}`
//!   sent once per utterance, in order. `history_snapshot` holds every turn
//!   since the connection opened with roles `"user"` and `"ai"`.

mod handler;
pub mod messages;

pub use handler::chat_handler;
pub use messages::{ChatMessageRoute, ChatOutgoingMessage};
