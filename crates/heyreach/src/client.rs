use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use outreach_core::config::HeyReachConfig;
use outreach_core::domain::conversation::ConversationId;

use crate::retry::RetryPolicy;
use crate::wire::{
    decode_chatroom, decode_page, AddTagsRequest, ConversationsRequest, SendMessageRequest,
    StatsRequest,
};
use crate::{
    Chatroom, ConversationPage, ConversationQuery, CrmClient, CrmError, OutboundMessage,
    StatsQuery, TagRequest,
};

const API_KEY_HEADER: &str = "X-API-KEY";

/// HTTP client for the HeyReach public API.
pub struct HeyReachClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    retry: RetryPolicy,
}

impl HeyReachClient {
    /// `base_url` is like `https://api.heyreach.io`; a trailing slash is tolerated.
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CrmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &HeyReachConfig) -> Result<Self, CrmError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value, CrmError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(event_name = "heyreach.request", operation, url = %url, "calling heyreach");

        self.retry
            .run(operation, || self.attempt(method.clone(), &url, query, body))
            .await
    }

    async fn attempt<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Value, CrmError> {
        let mut request = self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response =
            request.send().await.map_err(|error| CrmError::Transport(error.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|error| CrmError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(CrmError::Http { status: status.as_u16(), body: text });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|error| CrmError::Decode(error.to_string()))
    }
}

#[async_trait]
impl CrmClient for HeyReachClient {
    async fn check_api_key(&self) -> Result<(), CrmError> {
        self.call::<()>("check_api_key", Method::GET, "/api/public/auth/CheckApiKey", &[], None)
            .await
            .map(|_| ())
    }

    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationPage, CrmError> {
        let body = ConversationsRequest::new(query);
        let value = self
            .call(
                "list_conversations",
                Method::POST,
                "/api/public/inbox/GetConversationsV2",
                &[],
                Some(&body),
            )
            .await?;

        let page = decode_page(value).map_err(|error| CrmError::Decode(error.to_string()))?;
        info!(
            event_name = "heyreach.conversations.fetched",
            count = page.conversations.len(),
            total = page.total_count,
            "fetched conversations"
        );
        Ok(page)
    }

    async fn get_chatroom(
        &self,
        account_id: i64,
        conversation_id: &ConversationId,
    ) -> Result<Chatroom, CrmError> {
        let query = [
            ("accountId", account_id.to_string()),
            ("conversationId", conversation_id.0.clone()),
        ];
        let value = self
            .call::<()>("get_chatroom", Method::GET, "/api/public/inbox/GetChatroom", &query, None)
            .await?;

        decode_chatroom(value).map_err(|error| CrmError::Decode(error.to_string()))
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), CrmError> {
        let body = SendMessageRequest::new(message);
        self.call("send_message", Method::POST, "/api/public/inbox/SendMessage", &[], Some(&body))
            .await?;

        info!(
            event_name = "heyreach.message.sent",
            correlation_id = %message.conversation_id,
            account_id = message.account_id,
            "message sent"
        );
        Ok(())
    }

    async fn add_tags(&self, request: &TagRequest) -> Result<(), CrmError> {
        let body = AddTagsRequest::new(request);
        self.call("add_tags", Method::POST, "/api/public/lead/AddTags", &[], Some(&body))
            .await
            .map(|_| ())
    }

    async fn overall_stats(&self, query: &StatsQuery) -> Result<Value, CrmError> {
        let body = StatsRequest::new(query);
        self.call(
            "overall_stats",
            Method::POST,
            "/api/public/stats/GetOverallStats",
            &[],
            Some(&body),
        )
        .await
    }
}
