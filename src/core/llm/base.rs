//! Base trait and error types for generation backends.
//!
//! A backend is an opaque capability: given an ordered list of role-tagged
//! messages with one leading system directive, produce reply text or fail.
//! Backends never retry; the session decides what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::conversation::ChatMessage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while generating a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend did not answer within the configured bound
    #[error("Generation timed out: {0}")]
    Timeout(String),

    /// Transport-level failure talking to the backend
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Quota or rate limit exhausted
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Backend returned an error status
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Backend answered with something that is not a usable reply
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The generator could not be built from the given settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

// =============================================================================
// Generator Trait
// =============================================================================

/// Uniform interface to a language-generation backend.
#[async_trait]
pub trait BaseGenerator: Send + Sync {
    /// Produce a reply for the given context window.
    async fn generate(&self, window: &[ChatMessage]) -> GenerationResult<String>;

    /// Provider identifier used in logs (e.g. "gemini").
    fn provider_name(&self) -> &str;

    /// Model identifier used in logs.
    fn model(&self) -> &str;
}

/// Run `generator` with an upper bound on how long the call may take.
///
/// Elapsing maps to [`GenerationError::Timeout`] so callers handle a stalled
/// backend exactly like any other backend fault.
pub async fn generate_with_timeout(
    generator: &dyn BaseGenerator,
    window: &[ChatMessage],
    timeout: Duration,
) -> GenerationResult<String> {
    match tokio::time::timeout(timeout, generator.generate(window)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(format!(
            "{} did not respond within {}ms",
            generator.provider_name(),
            timeout.as_millis()
        ))),
    }
}
