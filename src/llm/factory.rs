//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients. All inputs come
//! from [`LlmConfig`]; environment variables are folded in earlier by
//! `Config::apply_env_defaults`.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{AskError, Result};
use crate::llm::{
    LlmClient, LlmProvider, MockLlmClient, OllamaClient, OllamaConfig, OpenAiClient, OpenAiConfig,
};

/// Creates an LLM client for the configured provider.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| config.provider.default_model().to_string());

    match config.provider {
        LlmProvider::OpenAi => {
            let key = config.api_key.clone().ok_or_else(|| {
                AskError::config("No API key configured. Set OPENAI_API_KEY or [llm] api_key.")
            })?;
            let mut client_config = OpenAiConfig::new(key, model);
            if let Some(url) = &config.base_url {
                client_config = client_config.with_url(url.clone());
            }
            if let Some(timeout) = config.timeout_secs {
                client_config = client_config.with_timeout(timeout);
            }
            Ok(Arc::new(OpenAiClient::new(client_config)?))
        }
        LlmProvider::Ollama => {
            let mut client_config = OllamaConfig::new(model);
            if let Some(url) = &config.base_url {
                client_config = client_config.with_url(url.clone());
            }
            if let Some(timeout) = config.timeout_secs {
                client_config = client_config.with_timeout(timeout);
            }
            Ok(Arc::new(OllamaClient::new(client_config)?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockLlmClient::new())),
    }
}
