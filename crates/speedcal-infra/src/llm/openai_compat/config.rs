//! Configuration for the OpenAI-compatible provider.
//!
//! The assistant talks to one endpoint chosen in `config.toml`; the provider
//! name and capability limits are derived from its base URL.

use std::time::Duration;

use secrecy::SecretString;
use speedcal_types::config::LlmConfig;
use speedcal_types::llm::ProviderCapabilities;

/// Configuration for an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Short provider label used in logs (e.g., "siliconflow", "openai").
    pub provider_name: String,
    pub base_url: String,
    /// `None` sends unauthenticated requests.
    pub api_key: Option<SecretString>,
    /// Default model when a request leaves `model` empty.
    pub model: String,
    /// Bound on one HTTP round trip (non-streaming) or on stream setup.
    pub request_timeout: Duration,
    pub capabilities: ProviderCapabilities,
}

impl OpenAiCompatConfig {
    pub fn from_llm_config(llm: &LlmConfig, api_key: Option<SecretString>) -> Self {
        let base_url = llm.base_url.trim_end_matches('/').to_string();
        Self {
            provider_name: provider_name_for(&base_url).to_string(),
            capabilities: capabilities_for(&base_url, llm.max_tokens),
            base_url,
            api_key,
            model: llm.model.clone(),
            request_timeout: Duration::from_secs(llm.timeout_secs.max(1)),
        }
    }
}

/// Label an endpoint by its host.
pub fn provider_name_for(base_url: &str) -> &'static str {
    let url = base_url.to_ascii_lowercase();
    if url.contains("siliconflow") {
        "siliconflow"
    } else if url.contains("api.openai.com") {
        "openai"
    } else if url.contains("api.deepseek.com") {
        "deepseek"
    } else if url.contains("localhost") || url.contains("127.0.0.1") {
        "local"
    } else {
        "openai_compat"
    }
}

fn capabilities_for(base_url: &str, max_output_tokens: u32) -> ProviderCapabilities {
    let max_context_tokens = match provider_name_for(base_url) {
        "openai" => 128_000,
        "deepseek" => 64_000,
        "local" => 8_192,
        _ => 32_768,
    };
    ProviderCapabilities {
        streaming: true,
        tool_calling: true,
        max_context_tokens,
        max_output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_siliconflow() {
        let config = OpenAiCompatConfig::from_llm_config(&LlmConfig::default(), None);
        assert_eq!(config.provider_name, "siliconflow");
        assert_eq!(config.base_url, "https://api.siliconflow.cn/v1");
        assert_eq!(config.model, "Qwen/Qwen2.5-72B-Instruct");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.capabilities.tool_calling);
        assert_eq!(config.capabilities.max_output_tokens, 2048);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let llm = LlmConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            ..LlmConfig::default()
        };
        let config = OpenAiCompatConfig::from_llm_config(&llm, None);
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.provider_name, "local");
        assert_eq!(config.capabilities.max_context_tokens, 8_192);
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(provider_name_for("https://api.openai.com/v1"), "openai");
        assert_eq!(provider_name_for("https://api.deepseek.com"), "deepseek");
        assert_eq!(provider_name_for("https://llm.internal/v1"), "openai_compat");
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let llm = LlmConfig {
            timeout_secs: 0,
            ..LlmConfig::default()
        };
        let config = OpenAiCompatConfig::from_llm_config(&llm, None);
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }
}
