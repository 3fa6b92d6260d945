use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use outreach_core::config::LlmProvider;

use crate::llm::{http_client, read_json, CompletionRequest, LlmClient, LlmError};

const BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Responses API client with strict JSON-schema output and optional
/// `file_search` retrieval over a pre-built vector store.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    vector_store_id: Option<String>,
    max_output_tokens: Option<u32>,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: BASE_URL.to_string(),
            api_key,
            vector_store_id: None,
            max_output_tokens: None,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_vector_store(mut self, vector_store_id: Option<String>) -> Self {
        self.vector_store_id = vector_store_id.filter(|id| !id.trim().is_empty());
        self
    }

    /// Reasoning models spend output tokens before answering, so no cap is the default.
    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut input = Vec::new();
        if let Some(system) = &request.system {
            input.push(json!({ "role": "system", "content": system }));
        }
        input.push(json!({ "role": "user", "content": request.user }));

        let mut body = json!({
            "model": request.model,
            "input": input,
        });

        if let Some(max_output_tokens) = self.max_output_tokens {
            body["max_output_tokens"] = json!(max_output_tokens);
        }

        if let Some(schema) = &request.schema {
            body["text"] = json!({
                "format": {
                    "type": "json_schema",
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": true,
                }
            });
        }

        if let Some(vector_store_id) = &self.vector_store_id {
            body["tools"] =
                json!([{ "type": "file_search", "vector_store_ids": [vector_store_id] }]);
        }

        body
    }
}

/// Concatenates every `output_text` part of the response's message items.
fn output_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let text = value
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    Some(text)
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    fn retrieval_enabled(&self) -> bool {
        self.vector_store_id.is_some()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let value = read_json(response).await?;
        match output_text(&value) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}
