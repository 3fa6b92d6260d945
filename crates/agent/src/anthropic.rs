use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use outreach_core::config::LlmProvider;

use crate::llm::{http_client, read_json, CompletionRequest, LlmClient, LlmError};

const BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client. Structured output is requested by describing
/// the schema in the system prompt.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self { http: http_client(timeout)?, base_url: BASE_URL.to_string(), api_key })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn system_prompt(request: &CompletionRequest) -> Option<String> {
        let schema = request.schema.as_ref().map(|schema| {
            format!(
                "## RESPONSE FORMAT\n\nRespond with a single JSON object and nothing else. \
                 It must match this JSON schema (`{}`):\n\n{}",
                schema.name,
                serde_json::to_string_pretty(&schema.schema).unwrap_or_default()
            )
        });

        match (request.system.as_deref(), schema) {
            (Some(system), Some(schema)) => Some(format!("{system}\n\n{schema}")),
            (Some(system), None) => Some(system.to_string()),
            (None, schema) => schema,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: Self::system_prompt(request),
            messages: vec![RequestMessage { role: "user", content: &request.user }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let value = read_json(response).await?;
        let parsed: MessagesResponse =
            serde_json::from_value(value).map_err(|error| LlmError::Decode(error.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
