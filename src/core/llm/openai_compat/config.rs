//! Configuration types for OpenAI-compatible chat completion backends.

use serde::{Deserialize, Serialize};

/// Google's OpenAI-compatible Gemini endpoint.
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-lite-latest";

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// =============================================================================
// Providers
// =============================================================================

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini through its OpenAI-compatible endpoint
    #[default]
    Gemini,
    /// OpenAI chat completions
    OpenAI,
}

impl LlmProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(LlmProvider::Gemini),
            "openai" => Some(LlmProvider::OpenAI),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_OPENAI_BASE_URL,
            Self::OpenAI => OPENAI_BASE_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::OpenAI => DEFAULT_OPENAI_MODEL,
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Settings for [`super::OpenAICompatGenerator`].
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    pub provider: LlmProvider,
    /// Bearer token. Empty means "not configured"; requests will be rejected
    /// by the backend and surface as generation errors.
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAICompatConfig {
    /// Defaults for a provider with the given key.
    pub fn for_provider(provider: LlmProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
        }
    }

    /// Full chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model must not be empty".to_string());
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid base URL '{}': {e}", self.base_url))?;
        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(format!(
                "Temperature must be between 0.0 and 2.0, got {temperature}"
            ));
        }
        Ok(())
    }
}

impl Default for OpenAICompatConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::default(), String::new())
    }
}
