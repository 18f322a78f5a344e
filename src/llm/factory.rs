use anyhow::Result;
use tracing::debug;

use super::client::{LlmClient, MockLlmClient};
use super::client_impl::{GeminiClient, OpenAIClient, GEMINI_BASE_URL, OPENAI_BASE_URL};
use crate::config::{Config, Provider};

/// Create a client for `provider`/`model`. Dry runs never touch the network.
pub fn create_client(
    config: &Config,
    provider: Provider,
    model: &str,
    dry_run: bool,
) -> Result<Box<dyn LlmClient>> {
    if dry_run {
        return Ok(Box::new(MockLlmClient::new()));
    }

    let api_key = config.api_key(provider)?;
    let timeout = config.ai.timeout_secs;
    debug!("Creating {} client for model {}", provider, model);

    match provider {
        Provider::OpenAI => {
            let base_url = config
                .ai
                .openai_base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            Ok(Box::new(OpenAIClient::with_base_url(
                api_key,
                model.to_string(),
                base_url,
                timeout,
            )?))
        }
        Provider::Gemini => {
            let base_url = config
                .ai
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string());
            Ok(Box::new(GeminiClient::with_base_url(
                api_key,
                model.to_string(),
                base_url,
                timeout,
            )?))
        }
    }
}
