//! LLM provider implementations.
//!
//! [`create_provider`] builds the configured OpenAI-compatible provider and
//! [`check_provider_connection`] verifies an endpoint with a tiny request.

pub mod openai_compat;

use secrecy::SecretString;

use speedcal_core::llm::box_provider::BoxLlmProvider;
use speedcal_types::config::LlmConfig;
use speedcal_types::llm::{CompletionRequest, LlmError, Message};

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] for the `[llm]` section of the config.
///
/// `api_key` is the already-resolved secret (see
/// [`crate::config::resolve_llm_api_key`]).
pub fn create_provider(config: &LlmConfig, api_key: Option<SecretString>) -> BoxLlmProvider {
    let provider = OpenAiCompatibleProvider::new(OpenAiCompatConfig::from_llm_config(config, api_key));
    BoxLlmProvider::new(provider)
}

/// Send a minimal completion to check the key and endpoint.
pub async fn check_provider_connection(provider: &BoxLlmProvider) -> Result<(), LlmError> {
    let request = CompletionRequest {
        model: String::new(), // provider default
        messages: vec![Message::user("Hello")],
        system: None,
        max_tokens: 10,
        temperature: Some(0.0),
        stream: false,
        tools: Vec::new(),
    };
    provider.complete(&request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_uses_config() {
        let provider = create_provider(&LlmConfig::default(), None);
        assert_eq!(provider.name(), "siliconflow");
    }

    #[test]
    fn test_create_provider_custom_endpoint() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            model: "local-model".to_string(),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config, Some(SecretString::from("sk-local".to_string())));
        assert_eq!(provider.name(), "local");
        assert!(provider.capabilities().tool_calling);
    }
}
