//! Generation backend module.
//!
//! # Architecture
//!
//! - `BaseGenerator` trait for backend abstraction
//! - `OpenAICompatGenerator` for any `/chat/completions` endpoint (Gemini, OpenAI)
//! - `create_generator` factory driven by `ServerConfig`
//!
//! # Example
//!
//! ```rust,ignore
//! use mirage_gateway::core::llm::{create_generator, generate_with_timeout};
//!
//! let generator = create_generator(&config)?;
//! let reply = generate_with_timeout(generator.as_ref(), &window, config.generation_timeout()).await?;
//! ```

mod base;
pub mod openai_compat;

use std::sync::Arc;

use tracing::{info, warn};

pub use base::{BaseGenerator, GenerationError, GenerationResult, generate_with_timeout};
pub use openai_compat::{LlmProvider, OpenAICompatConfig, OpenAICompatGenerator};

use crate::config::ServerConfig;

/// Shared handle to a generator; one instance serves every session.
pub type SharedGenerator = Arc<dyn BaseGenerator>;

/// Create the generation backend described by `config`.
///
/// A missing API key only produces a warning: the server still starts and
/// each turn is answered with the fallback reply until a key is configured.
pub fn create_generator(config: &ServerConfig) -> GenerationResult<SharedGenerator> {
    let generator_config = config
        .generator_config()
        .map_err(GenerationError::InvalidConfiguration)?;

    if generator_config.api_key.is_empty() {
        warn!(
            provider = %generator_config.provider,
            "API key not configured; generation requests will fail until it is set"
        );
    }

    let generator = OpenAICompatGenerator::new(generator_config)?;
    info!(
        provider = generator.provider_name(),
        model = generator.model(),
        "Generation backend initialized"
    );
    Ok(Arc::new(generator))
}

/// Get list of supported generation providers.
pub fn get_supported_llm_providers() -> Vec<&'static str> {
    vec!["gemini", "openai"]
}
