//! Chat WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::chat::chat_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the chat WebSocket router
///
/// # Endpoint
///
/// `GET /ws/chat` - WebSocket upgrade for a conversation session
///
/// # Example
///
/// ```text
/// // Client sends a text frame
/// Hello
///
/// // Server responds
/// {"type": "audio_response", "text": "Hi there!",
///  "history_snapshot": [{"role": "user", "content": "Hello"},
///                       {"role": "ai", "content": "Hi there!"}]}
/// ```
///
/// Connection limits are applied in main.rs where the state is available.
pub fn create_chat_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/chat", get(chat_handler))
        .layer(TraceLayer::new_for_http())
}
