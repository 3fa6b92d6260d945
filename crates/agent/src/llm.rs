use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use outreach_core::config::{LlmConfig, LlmProvider};

use crate::anthropic::AnthropicClient;
use crate::openai::OpenAiClient;
use crate::prompts::PromptError;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("llm provider returned no text output")]
    EmptyResponse,
    #[error("could not decode llm response: {0}")]
    Decode(String),
    #[error("llm client is not configured: {0}")]
    Configuration(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct JsonSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub schema: Option<JsonSchema>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> LlmProvider;

    /// Whether requests carry a knowledge retrieval tool.
    fn retrieval_enabled(&self) -> bool {
        false
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Model names used for one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSelection {
    pub primary: String,
    pub review: String,
}

impl ModelSelection {
    pub fn from_config(config: &LlmConfig) -> Self {
        match config.resolved_provider() {
            LlmProvider::OpenAi => Self {
                primary: config.primary_model.clone(),
                review: config.review_model.clone(),
            },
            LlmProvider::Anthropic => Self {
                primary: config.anthropic_model.clone(),
                review: config.anthropic_model.clone(),
            },
        }
    }
}

/// Builds the configured provider's client.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let provider = config.resolved_provider();
    let api_key = config
        .api_key_for(provider)
        .cloned()
        .ok_or_else(|| LlmError::Configuration(format!("missing api key for {provider:?}")))?;
    let timeout = Duration::from_secs(config.timeout_secs);

    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::OpenAi => Arc::new(
            OpenAiClient::new(api_key, timeout)?
                .with_vector_store(config.vector_store_id.clone())
                .with_max_output_tokens(config.openai_max_output_tokens),
        ),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(api_key, timeout)?),
    };
    Ok(client)
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| LlmError::Transport(error.to_string()))
}

pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    let body = response.text().await.map_err(|error| LlmError::Transport(error.to_string()))?;
    if !status.is_success() {
        return Err(LlmError::Http { status: status.as_u16(), body });
    }
    serde_json::from_str(&body).map_err(|error| LlmError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use outreach_core::config::{AppConfig, LlmProvider};

    use super::{client_from_config, ModelSelection};

    #[test]
    fn model_selection_follows_resolved_provider() {
        let mut config = AppConfig::default().llm;
        config.openai_api_key = Some(SecretString::from("sk-test".to_string()));
        let models = ModelSelection::from_config(&config);
        assert_eq!(models.primary, "gpt-5-mini");
        assert_eq!(models.review, "gpt-5");

        config.provider = Some(LlmProvider::Anthropic);
        let models = ModelSelection::from_config(&config);
        assert_eq!(models.primary, "claude-sonnet-4-20250514");
    }

    #[test]
    fn client_requires_key_for_selected_provider() {
        let mut config = AppConfig::default().llm;
        config.provider = Some(LlmProvider::Anthropic);
        assert!(client_from_config(&config).is_err());

        config.anthropic_api_key = Some(SecretString::from("sk-ant".to_string()));
        let client = client_from_config(&config).expect("anthropic client");
        assert_eq!(client.provider(), LlmProvider::Anthropic);
    }
}
