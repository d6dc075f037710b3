pub mod api;
pub mod chat;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Assemble every route with its per-route middleware and bind the state.
///
/// Cross-cutting layers (CORS, rate limiting, security headers) are added by
/// the binary on top of this router.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    // Connection limits apply to WebSocket upgrades only
    let chat_routes = chat::create_chat_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    api::create_api_router()
        .merge(chat_routes)
        .with_state(state)
}
