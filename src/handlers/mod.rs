//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and session listing endpoints
//! - `chat` - Conversational WebSocket

pub mod api;
pub mod chat;

pub use chat::chat_handler;
