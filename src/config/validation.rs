//! Configuration validation logic.

use crate::core::llm::LlmProvider;

use super::ServerConfig;

/// Validate a fully merged configuration.
pub(super) fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_llm_provider(&config.llm_provider)?;
    validate_llm_temperature(config.llm_temperature)?;
    validate_llm_timeout(config.llm_timeout_seconds)?;
    validate_llm_base_url(config.llm_base_url.as_deref())?;
    validate_rate_limit(config.rate_limit_requests_per_second, config.rate_limit_burst_size)?;
    Ok(())
}

pub(super) fn validate_llm_provider(provider: &str) -> Result<(), Box<dyn std::error::Error>> {
    if LlmProvider::parse(provider).is_none() {
        return Err(format!(
            "Unsupported LLM provider '{provider}'. Supported: gemini, openai"
        )
        .into());
    }
    Ok(())
}

pub(super) fn validate_llm_temperature(temperature: f32) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(format!("LLM temperature must be between 0.0 and 2.0, got {temperature}").into());
    }
    Ok(())
}

pub(super) fn validate_llm_timeout(timeout_seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    if timeout_seconds == 0 {
        return Err("LLM timeout must be greater than 0 seconds".into());
    }
    Ok(())
}

pub(super) fn validate_llm_base_url(base_url: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(base_url) = base_url {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| format!("Invalid LLM base URL '{base_url}': {e}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(format!(
                "LLM base URL must use http or https, got '{}'",
                parsed.scheme()
            )
            .into());
        }
    }
    Ok(())
}

pub(super) fn validate_rate_limit(rps: u32, burst: u32) -> Result<(), Box<dyn std::error::Error>> {
    if rps == 0 || burst == 0 {
        return Err("Rate limit values must be greater than 0".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_llm_provider() {
        assert!(validate_llm_provider("gemini").is_ok());
        assert!(validate_llm_provider("OpenAI").is_ok());
        assert!(validate_llm_provider("cohere").is_err());
    }

    #[test]
    fn test_validate_llm_temperature() {
        assert!(validate_llm_temperature(0.0).is_ok());
        assert!(validate_llm_temperature(2.0).is_ok());
        assert!(validate_llm_temperature(-0.1).is_err());
        assert!(validate_llm_temperature(2.1).is_err());
    }

    #[test]
    fn test_validate_llm_timeout() {
        assert!(validate_llm_timeout(1).is_ok());
        assert!(validate_llm_timeout(0).is_err());
    }

    #[test]
    fn test_validate_llm_base_url() {
        assert!(validate_llm_base_url(None).is_ok());
        assert!(validate_llm_base_url(Some("http://localhost:9000/v1")).is_ok());
        assert!(validate_llm_base_url(Some("ftp://example.com")).is_err());
        assert!(validate_llm_base_url(Some("not a url")).is_err());
    }

    #[test]
    fn test_validate_rate_limit() {
        assert!(validate_rate_limit(60, 10).is_ok());
        assert!(validate_rate_limit(0, 10).is_err());
    }
}
