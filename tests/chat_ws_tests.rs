//! Chat WebSocket integration tests
//!
//! Runs the full router on a local port with a wiremock server standing in
//! for the OpenAI-compatible generation backend:
//! - Request/reply cycle and transcript snapshots
//! - Backend failures, timeouts and the fallback reply
//! - Session registration, cleanup on disconnect and panic isolation
//! - Protocol violations and connection limits
//!
//! Run: cargo test --test chat_ws_tests -- --nocapture

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use async_trait::async_trait;
use mirage_gateway::{
    BaseGenerator, ChatMessage, FALLBACK_REPLY, GenerationResult, ServerConfig, SharedGenerator,
    routes, state::AppState,
};

mod common {
    use super::*;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    pub type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    pub fn create_config(backend_url: &str) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            llm_provider: "openai".to_string(),
            llm_model: Some("test-model".to_string()),
            llm_base_url: Some(backend_url.to_string()),
            llm_temperature: 0.7,
            llm_max_tokens: None,
            llm_timeout_seconds: 5,
            google_api_key: None,
            openai_api_key: Some("test-key".to_string()),
            system_prompt: Some("You are a test persona.".to_string()),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }

    pub async fn start_test_server(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
        let app_state = AppState::new(config).expect("Failed to build state");
        serve(app_state).await
    }

    pub async fn start_test_server_with_generator(
        config: ServerConfig,
        generator: SharedGenerator,
    ) -> (SocketAddr, Arc<AppState>) {
        serve(AppState::with_generator(config, generator)).await
    }

    async fn serve(app_state: Arc<AppState>) -> (SocketAddr, Arc<AppState>) {
        let app = routes::create_app_router(app_state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        (addr, app_state)
    }

    pub async fn connect(addr: SocketAddr) -> Client {
        let url = format!("ws://{}/ws/chat", addr);
        let (ws, _) = timeout(Duration::from_secs(5), connect_async(&url))
            .await
            .expect("Connect timed out")
            .expect("Failed to connect");
        ws
    }

    /// Create a text message with proper conversion for tungstenite 0.28
    pub fn text_message(s: &str) -> Message {
        Message::Text(s.to_string().into())
    }

    /// Create a binary message with proper conversion for tungstenite 0.28
    pub fn binary_message(data: Vec<u8>) -> Message {
        Message::Binary(data.into())
    }

    /// Next JSON text frame from the server.
    pub async fn next_json(ws: &mut Client) -> Value {
        loop {
            let frame = timeout(Duration::from_secs(10), ws.next())
                .await
                .expect("Timed out waiting for reply")
                .expect("Stream ended")
                .expect("WebSocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).expect("Reply is not JSON");
            }
        }
    }

    pub async fn mount_reply(server: &MockServer, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
            .mount(server)
            .await;
    }

    pub fn completion(reply: &str) -> Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": reply},
                "finish_reason": "stop"
            }]
        })
    }

    /// Poll until the registry holds `expected` sessions.
    pub async fn wait_for_sessions(state: &AppState, expected: usize) {
        timeout(Duration::from_secs(5), async {
            while state.sessions.len() != expected {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expected} sessions, registry holds {}",
                state.sessions.len()
            )
        });
    }
}

// =============================================================================
// Request/Reply Cycle
// =============================================================================

#[tokio::test]
async fn test_hello_round_trip() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "Hi there!").await;

    let (addr, _state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;

    ws.send(common::text_message("Hello")).await.unwrap();
    let reply = common::next_json(&mut ws).await;

    assert_eq!(
        reply,
        json!({
            "type": "audio_response",
            "text": "Hi there!",
            "history_snapshot": [
                {"role": "user", "content": "Hello"},
                {"role": "ai", "content": "Hi there!"}
            ]
        })
    );

    // The backend saw the persona directive followed by the utterance
    let requests = backend.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "You are a test persona."},
            {"role": "user", "content": "Hello"}
        ])
    );
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer test-key"
    );
}

#[tokio::test]
async fn test_snapshot_grows_and_window_stays_bounded() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "ok").await;

    let (addr, _state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;

    let mut previous: Vec<Value> = Vec::new();
    for k in 1..=6usize {
        ws.send(common::text_message(&format!("message {k}")))
            .await
            .unwrap();
        let reply = common::next_json(&mut ws).await;
        let snapshot = reply["history_snapshot"].as_array().unwrap().clone();

        assert_eq!(snapshot.len(), 2 * k);
        assert_eq!(&snapshot[..2 * k - 2], previous.as_slice());
        previous = snapshot;
    }

    for request in backend.received_requests().await.unwrap() {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert!(messages.len() <= 7);
        assert_eq!(messages[0]["role"], "system");
    }
}

#[tokio::test]
async fn test_queued_messages_answered_in_order() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "noted").await;

    let (addr, _state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;

    // Send a burst without waiting for replies
    for utterance in ["first", "second", "third"] {
        ws.send(common::text_message(utterance)).await.unwrap();
    }

    for (k, utterance) in ["first", "second", "third"].iter().enumerate() {
        let reply = common::next_json(&mut ws).await;
        let snapshot = reply["history_snapshot"].as_array().unwrap();
        assert_eq!(snapshot.len(), 2 * (k + 1));
        assert_eq!(snapshot[2 * k]["content"], *utterance);
    }
}

// =============================================================================
// Backend Failures
// =============================================================================

#[tokio::test]
async fn test_backend_error_yields_fallback_and_session_continues() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "internal error"}})),
        )
        .up_to_n_times(1)
        .mount(&backend)
        .await;
    common::mount_reply(&backend, "back online").await;

    let (addr, _state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;

    ws.send(common::text_message("are you there?")).await.unwrap();
    let failed = common::next_json(&mut ws).await;
    assert_eq!(failed["text"], FALLBACK_REPLY);
    assert_eq!(failed["history_snapshot"][1]["role"], "ai");
    assert_eq!(failed["history_snapshot"][1]["content"], FALLBACK_REPLY);

    ws.send(common::text_message("how about now?")).await.unwrap();
    let recovered = common::next_json(&mut ws).await;
    assert_eq!(recovered["text"], "back online");
    assert_eq!(recovered["history_snapshot"].as_array().unwrap().len(), 4);

    // The apology is part of the context the backend sees next
    let requests = backend.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(
        body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .any(|m| m["role"] == "assistant" && m["content"] == FALLBACK_REPLY)
    );
}

#[tokio::test]
async fn test_slow_backend_times_out_into_fallback() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::completion("too late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&backend)
        .await;

    let mut config = common::create_config(&backend.uri());
    config.llm_timeout_seconds = 1;
    let (addr, _state) = common::start_test_server(config).await;
    let mut ws = common::connect(addr).await;

    ws.send(common::text_message("hello?")).await.unwrap();
    let reply = common::next_json(&mut ws).await;
    assert_eq!(reply["text"], FALLBACK_REPLY);
}

#[tokio::test]
async fn test_missing_api_key_yields_fallback() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Missing bearer token"}
        })))
        .mount(&backend)
        .await;

    let mut config = common::create_config(&backend.uri());
    config.openai_api_key = None;
    let (addr, _state) = common::start_test_server(config).await;
    let mut ws = common::connect(addr).await;

    ws.send(common::text_message("Hello")).await.unwrap();
    let reply = common::next_json(&mut ws).await;
    assert_eq!(reply["text"], FALLBACK_REPLY);
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_deregistered_after_client_close() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "bye").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;
    common::wait_for_sessions(&state, 1).await;

    ws.send(common::text_message("goodbye")).await.unwrap();
    common::next_json(&mut ws).await;

    ws.close(None).await.unwrap();
    common::wait_for_sessions(&state, 0).await;
    assert_eq!(state.ws_connection_count(), 0);
}

#[tokio::test]
async fn test_disconnect_during_generation_releases_session() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::completion("nobody is listening"))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&backend)
        .await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;
    common::wait_for_sessions(&state, 1).await;

    ws.send(common::text_message("long question")).await.unwrap();
    // Let the backend call start before vanishing
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(ws);

    // Cleanup does not wait for the 4s backend delay
    timeout(Duration::from_secs(2), common::wait_for_sessions(&state, 0))
        .await
        .expect("Session outlived its connection");
}

#[tokio::test]
async fn test_reconnect_starts_fresh_transcript() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "noted").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;

    let mut first = common::connect(addr).await;
    first.send(common::text_message("remember this")).await.unwrap();
    common::next_json(&mut first).await;
    first.close(None).await.unwrap();
    common::wait_for_sessions(&state, 0).await;

    let mut second = common::connect(addr).await;
    second.send(common::text_message("what did I say?")).await.unwrap();
    let reply = common::next_json(&mut second).await;

    assert_eq!(
        reply["history_snapshot"],
        json!([
            {"role": "user", "content": "what did I say?"},
            {"role": "ai", "content": "noted"}
        ])
    );

    // Nothing from the earlier connection reaches the backend either
    let requests = backend.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "You are a test persona."},
            {"role": "user", "content": "what did I say?"}
        ])
    );
}

/// Panics on the utterance "boom", answers "fine" otherwise.
struct FragileGenerator;

#[async_trait]
impl BaseGenerator for FragileGenerator {
    async fn generate(&self, window: &[ChatMessage]) -> GenerationResult<String> {
        if window.last().is_some_and(|m| m.content == "boom") {
            panic!("generator failed on purpose");
        }
        Ok("fine".to_string())
    }

    fn provider_name(&self) -> &str {
        "fragile"
    }

    fn model(&self) -> &str {
        "fragile-1"
    }
}

#[tokio::test]
async fn test_panic_in_one_session_spares_siblings() {
    let (addr, state) = common::start_test_server_with_generator(
        common::create_config("http://127.0.0.1:9"),
        Arc::new(FragileGenerator),
    )
    .await;

    let mut healthy = common::connect(addr).await;
    let mut doomed = common::connect(addr).await;
    common::wait_for_sessions(&state, 2).await;

    doomed.send(common::text_message("boom")).await.unwrap();

    // The failing client is closed without a reply
    let closed = timeout(Duration::from_secs(5), async {
        while let Some(frame) = doomed.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(Message::Text(_)) => return false,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .expect("Panicking session was not closed");
    assert!(closed);

    common::wait_for_sessions(&state, 1).await;
    assert_eq!(state.ws_connection_count(), 1);

    healthy.send(common::text_message("still there?")).await.unwrap();
    let reply = common::next_json(&mut healthy).await;
    assert_eq!(reply["text"], "fine");
    assert_eq!(reply["history_snapshot"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "same reply").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            tokio::spawn(async move {
                let mut ws = common::connect(addr).await;
                let utterance = format!("client {i}");
                ws.send(common::text_message(&utterance)).await.unwrap();
                let reply = common::next_json(&mut ws).await;
                let snapshot = reply["history_snapshot"].as_array().unwrap().clone();
                ws.close(None).await.ok();
                (utterance, snapshot)
            })
        })
        .collect();

    for handle in handles {
        let (utterance, snapshot) = handle.await.unwrap();
        // Each transcript holds only its own connection's turns
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0]["content"], utterance);
    }

    common::wait_for_sessions(&state, 0).await;
}

#[tokio::test]
async fn test_sessions_endpoint_lists_live_sessions() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "hi").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let _first = common::connect(addr).await;
    let _second = common::connect(addr).await;
    common::wait_for_sessions(&state, 2).await;

    let body: Value = reqwest::get(format!("http://{}/sessions", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["active_sessions"], 2);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s["client_ip"] == "127.0.0.1"));
}

#[tokio::test]
async fn test_shutdown_all_closes_open_sessions() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "hi").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;
    common::wait_for_sessions(&state, 1).await;

    state.sessions.shutdown_all();
    common::wait_for_sessions(&state, 0).await;

    // The client observes the close
    let closed = timeout(Duration::from_secs(5), async {
        while let Some(frame) = ws.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                return;
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

// =============================================================================
// Protocol and Limits
// =============================================================================

#[tokio::test]
async fn test_binary_frame_closes_session() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "unused").await;

    let (addr, state) = common::start_test_server(common::create_config(&backend.uri())).await;
    let mut ws = common::connect(addr).await;
    common::wait_for_sessions(&state, 1).await;

    ws.send(common::binary_message(vec![0u8; 16])).await.unwrap();

    let closed = timeout(Duration::from_secs(5), async {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                Ok(Message::Text(_)) => return false,
                Ok(_) => {}
            }
        }
        true
    })
    .await
    .expect("Server did not close the session");
    assert!(closed);

    common::wait_for_sessions(&state, 0).await;
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_per_ip_connection_limit() {
    let backend = MockServer::start().await;
    common::mount_reply(&backend, "hi").await;

    let mut config = common::create_config(&backend.uri());
    config.max_connections_per_ip = 1;
    let (addr, state) = common::start_test_server(config).await;

    let first = common::connect(addr).await;
    common::wait_for_sessions(&state, 1).await;

    let url = format!("ws://{}/ws/chat", addr);
    match connect_async(&url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 429);
        }
        other => panic!("expected HTTP 429 rejection, got {:?}", other.map(|_| ())),
    }

    // Slot comes back once the first session ends
    drop(first);
    common::wait_for_sessions(&state, 0).await;
    let _second = common::connect(addr).await;
}
