//! Merge environment values with YAML overrides and apply defaults.

use std::path::PathBuf;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 8000;
pub(super) const DEFAULT_LLM_PROVIDER: &str = "gemini";
pub(super) const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;
pub(super) const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 30;
pub(super) const DEFAULT_CORS_ALLOWED_ORIGINS: &str = "*";
pub(super) const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub(super) const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
pub(super) const DEFAULT_MAX_CONNECTIONS_PER_IP: usize = 100;

/// Build the final configuration: YAML > ENV > defaults.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let llm = yaml.llm.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let conversation = yaml.conversation.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let tls_enabled = tls_yaml.enabled.or(env.tls_enabled).unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = tls_yaml
            .cert_path
            .or(env.tls_cert_path)
            .ok_or("TLS is enabled but no certificate path is configured (TLS_CERT_PATH)")?;
        let key_path = tls_yaml
            .key_path
            .or(env.tls_key_path)
            .ok_or("TLS is enabled but no key path is configured (TLS_KEY_PATH)")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,
        llm_provider: llm
            .provider
            .or(env.llm_provider)
            .unwrap_or_else(|| DEFAULT_LLM_PROVIDER.to_string()),
        llm_model: llm.model.or(env.llm_model),
        llm_base_url: llm.base_url.or(env.llm_base_url),
        llm_temperature: llm
            .temperature
            .or(env.llm_temperature)
            .unwrap_or(DEFAULT_LLM_TEMPERATURE),
        llm_max_tokens: llm.max_tokens.or(env.llm_max_tokens),
        llm_timeout_seconds: llm
            .timeout_seconds
            .or(env.llm_timeout_seconds)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_SECONDS),
        google_api_key: providers.google_api_key.or(env.google_api_key),
        openai_api_key: providers.openai_api_key.or(env.openai_api_key),
        system_prompt: conversation.system_prompt.or(env.system_prompt),
        cors_allowed_origins: Some(
            security
                .cors_allowed_origins
                .or(env.cors_allowed_origins)
                .unwrap_or_else(|| DEFAULT_CORS_ALLOWED_ORIGINS.to_string()),
        ),
        rate_limit_requests_per_second: security
            .rate_limit_requests_per_second
            .or(env.rate_limit_requests_per_second)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: security
            .rate_limit_burst_size
            .or(env.rate_limit_burst_size)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        max_websocket_connections: security
            .max_websocket_connections
            .or(env.max_websocket_connections),
        max_connections_per_ip: security
            .max_connections_per_ip
            .or(env.max_connections_per_ip)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}
