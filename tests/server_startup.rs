//! Server Startup Tests
//!
//! Tests for server lifecycle, configuration loading, and startup behavior.
//! These tests verify that the server can start correctly under various conditions.

use std::io::Write;
use std::net::TcpListener;

use axum::{body::Body, http::Request, http::StatusCode};
use serial_test::serial;
use tempfile::NamedTempFile;
use tower::util::ServiceExt;

use mirage_gateway::{DEFAULT_SYSTEM_PROMPT, ServerConfig, routes, state::AppState};

/// Helper function to create a minimal test configuration
fn create_minimal_config(port: u16) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        tls: None,
        llm_provider: "gemini".to_string(),
        llm_model: None,
        llm_base_url: None,
        llm_temperature: 0.7,
        llm_max_tokens: None,
        llm_timeout_seconds: 30,
        google_api_key: None,
        openai_api_key: None,
        system_prompt: None,
        cors_allowed_origins: Some("*".to_string()),
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
        max_websocket_connections: None,
        max_connections_per_ip: 100,
    }
}

/// Find an available port for testing
fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The server boots without any API key; generation simply fails per turn
#[tokio::test]
async fn test_minimal_config_boot() {
    let config = create_minimal_config(find_available_port());
    let app_state = AppState::new(config).expect("State should build without API keys");

    assert_eq!(app_state.generator.provider_name(), "gemini");
    assert_eq!(app_state.generator.model(), "gemini-flash-lite-latest");
    assert_eq!(
        app_state.context_builder().system_directive(),
        DEFAULT_SYSTEM_PROMPT
    );

    let app = routes::create_app_router(app_state);
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "OK"}));
}

#[tokio::test]
async fn test_sessions_endpoint_starts_empty() {
    let app_state = AppState::new(create_minimal_config(find_available_port())).unwrap();
    let app = routes::create_app_router(app_state);

    let request = Request::builder()
        .uri("/sessions")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"active_sessions": 0, "sessions": []})
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app_state = AppState::new(create_minimal_config(find_available_port())).unwrap();
    let app = routes::create_app_router(app_state);

    let request = Request::builder()
        .uri("/voices")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_provider_fails_state_construction() {
    let mut config = create_minimal_config(find_available_port());
    config.llm_provider = "cohere".to_string();
    assert!(AppState::new(config).is_err());
}

#[tokio::test]
async fn test_openai_provider_with_custom_model() {
    let mut config = create_minimal_config(find_available_port());
    config.llm_provider = "openai".to_string();
    config.llm_model = Some("gpt-4o".to_string());
    config.openai_api_key = Some("sk-test".to_string());

    let app_state = AppState::new(config).unwrap();
    assert_eq!(app_state.generator.provider_name(), "openai");
    assert_eq!(app_state.generator.model(), "gpt-4o");
}

/// Configuration file drives the persona and the backend
#[tokio::test]
#[serial]
async fn test_boot_from_yaml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
server:
  host: "127.0.0.1"
  port: 9100
llm:
  provider: "openai"
  model: "gpt-4o-mini"
  temperature: 0.2
  timeout_seconds: 10
providers:
  openai_api_key: "sk-from-yaml"
conversation:
  system_prompt: "You are a terse assistant."
"#
    )
    .unwrap();

    let config = ServerConfig::from_file(&file.path().to_path_buf()).unwrap();
    assert_eq!(config.address(), "127.0.0.1:9100");

    let app_state = AppState::new(config).unwrap();
    assert_eq!(app_state.generator.provider_name(), "openai");
    assert_eq!(
        app_state.context_builder().system_directive(),
        "You are a terse assistant."
    );
    assert_eq!(app_state.generation_timeout().as_secs(), 10);
}

#[tokio::test]
async fn test_rate_limit_configurations() {
    let mut config = create_minimal_config(find_available_port());
    config.rate_limit_requests_per_second = 100;
    config.rate_limit_burst_size = 50;
    let app_state = AppState::new(config).unwrap();
    assert_eq!(app_state.config.rate_limit_requests_per_second, 100);

    let mut config2 = create_minimal_config(find_available_port());
    config2.rate_limit_requests_per_second = 100000;
    let app_state2 = AppState::new(config2).unwrap();
    assert!(app_state2.config.rate_limit_requests_per_second >= 100000);
}
