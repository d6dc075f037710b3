//! OpenAI-compatible chat completions client.
//!
//! Serves Gemini (through Google's compatibility endpoint) and OpenAI from one
//! code path; only the base URL, key and default model differ.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::config::OpenAICompatConfig;
use super::messages::{ChatCompletionRequest, ChatCompletionResponse, ErrorEnvelope};
use crate::core::conversation::ChatMessage;
use crate::core::llm::base::{BaseGenerator, GenerationError, GenerationResult};

/// Upper bound on establishing the TCP/TLS connection. The overall call is
/// bounded by the session through `generate_with_timeout`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Generator backed by a `/chat/completions` HTTP endpoint.
///
/// Does not derive Debug so the API key can't end up in logs.
pub struct OpenAICompatGenerator {
    config: OpenAICompatConfig,
    http_client: Client,
}

impl OpenAICompatGenerator {
    /// Create a new client.
    ///
    /// # Returns
    /// * `GenerationResult<Self>` - New instance, or `InvalidConfiguration`
    pub fn new(config: OpenAICompatConfig) -> GenerationResult<Self> {
        config
            .validate()
            .map_err(GenerationError::InvalidConfiguration)?;

        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                GenerationError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &OpenAICompatConfig {
        &self.config
    }

    fn map_request_error(e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(format!("Request timed out: {e}"))
        } else {
            GenerationError::Network(format!("Request failed: {e}"))
        }
    }

    fn map_status_error(status: StatusCode, body: &str) -> GenerationError {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| {
                let message = envelope.message()?;
                Some(match envelope.error_type() {
                    Some(error_type) => format!("{message} [{error_type}]"),
                    None => message.to_string(),
                })
            })
            .unwrap_or_else(|| body.to_string());
        let message = format!("API error ({status}): {detail}");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                GenerationError::AuthenticationFailed(message)
            }
            StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimitExceeded(message),
            _ => GenerationError::ProviderError(message),
        }
    }
}

#[async_trait]
impl BaseGenerator for OpenAICompatGenerator {
    async fn generate(&self, window: &[ChatMessage]) -> GenerationResult<String> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: window,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            messages = window.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_status_error(status, &response_text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parsed
            .into_text()
            .ok_or_else(|| GenerationError::InvalidResponse("Response contained no text".to_string()))
    }

    fn provider_name(&self) -> &str {
        self.config.provider.as_str()
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
