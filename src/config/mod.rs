//! Configuration module for the Mirage gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use mirage_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::conversation::DEFAULT_SYSTEM_PROMPT;
use crate::core::llm::{LlmProvider, OpenAICompatConfig};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Generation backend settings (provider, model, sampling, timeout)
/// - Provider API keys (Google, OpenAI)
/// - Conversation persona (system prompt)
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Generation backend
    /// Provider name ("gemini" or "openai")
    pub llm_provider: String,
    /// Model override; the provider default is used when unset
    pub llm_model: Option<String>,
    /// Base URL override for self-hosted or proxied OpenAI-compatible endpoints
    pub llm_base_url: Option<String>,
    /// Sampling temperature (0.0 to 2.0)
    pub llm_temperature: f32,
    /// Optional cap on reply length
    pub llm_max_tokens: Option<u32>,
    /// Upper bound on a single backend call; elapsing counts as a generation failure
    pub llm_timeout_seconds: u64,

    // Provider API keys
    /// Google AI Studio key used for Gemini
    pub google_api_key: Option<String>,
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    // Conversation
    /// Persona directive prepended to every context window
    pub system_prompt: Option<String>,

    // Security settings
    /// Comma-separated list of allowed origins, or "*" for any
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    /// Global WebSocket connection cap (None = unlimited)
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: usize,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.google_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and a previously loaded .env file)
    ///
    /// # Errors
    /// Returns an error if an environment variable has an invalid format or
    /// validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs at startup, so by now it is part of the environment
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Get the server address as a string ("host:port")
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Get API key for a specific provider
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "gemini" | "google" => self.google_api_key.as_ref().cloned().ok_or_else(|| {
                "Google API key not configured in server environment (GOOGLE_API_KEY)".to_string()
            }),
            "openai" => self.openai_api_key.as_ref().cloned().ok_or_else(|| {
                "OpenAI API key not configured in server environment (OPENAI_API_KEY)".to_string()
            }),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }

    /// The persona directive, falling back to the built-in Mirage prompt.
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Upper bound for one generation call.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    /// Build the backend client settings from this configuration.
    ///
    /// A missing API key is not an error here: the key is left empty and
    /// every call fails, which sessions answer with the fallback reply.
    pub fn generator_config(&self) -> Result<OpenAICompatConfig, String> {
        let provider = LlmProvider::parse(&self.llm_provider)
            .ok_or_else(|| format!("Unsupported LLM provider: {}", self.llm_provider))?;

        let mut config =
            OpenAICompatConfig::for_provider(provider, self.get_api_key(provider.as_str()).unwrap_or_default());
        if let Some(model) = &self.llm_model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.llm_base_url {
            config.base_url = base_url.clone();
        }
        config.temperature = Some(self.llm_temperature);
        config.max_tokens = self.llm_max_tokens;
        Ok(config)
    }
}
