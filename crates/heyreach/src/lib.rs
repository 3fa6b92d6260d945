//! HeyReach CRM integration.
//!
//! [`CrmClient`] is the seam the processing runtime and the dashboard depend on.
//! [`HeyReachClient`] implements it over the public REST API, normalizing both
//! response shapes into `outreach_core` conversation types inside [`wire`].

pub mod client;
pub mod retry;
pub mod wire;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use outreach_core::domain::conversation::{Conversation, ConversationId, Message, Prospect};
use outreach_core::errors::ApplicationError;

pub use client::HeyReachClient;
pub use retry::RetryPolicy;

/// Page size ceiling enforced by the listing endpoint.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("heyreach request failed: {0}")]
    Transport(String),
    #[error("heyreach returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("heyreach kept rate limiting after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("could not decode heyreach response: {0}")]
    Decode(String),
}

impl CrmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Http { status: 429, .. } | Self::RateLimited { .. })
    }

    /// Network failures, timeouts, 408, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::RateLimited { .. } | Self::Decode(_) => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

impl From<CrmError> for ApplicationError {
    fn from(error: CrmError) -> Self {
        ApplicationError::Integration(error.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationQuery {
    pub account_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
    pub seen: Option<bool>,
    pub offset: u32,
    pub limit: u32,
}

impl ConversationQuery {
    pub fn unseen(account_ids: Vec<i64>, campaign_ids: Vec<i64>, limit: u32) -> Self {
        Self { account_ids, campaign_ids, seen: Some(false), offset: 0, limit }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationPage {
    pub total_count: Option<u64>,
    pub conversations: Vec<Conversation>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chatroom {
    pub prospect: Option<Prospect>,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub account_id: i64,
    pub conversation_id: ConversationId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagRequest {
    pub profile_url: String,
    pub tags: Vec<String>,
    pub create_if_missing: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsQuery {
    pub account_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn check_api_key(&self) -> Result<(), CrmError>;
    async fn list_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationPage, CrmError>;
    async fn get_chatroom(
        &self,
        account_id: i64,
        conversation_id: &ConversationId,
    ) -> Result<Chatroom, CrmError>;
    async fn send_message(&self, message: &OutboundMessage) -> Result<(), CrmError>;
    async fn add_tags(&self, request: &TagRequest) -> Result<(), CrmError>;
    async fn overall_stats(&self, query: &StatsQuery) -> Result<serde_json::Value, CrmError>;
}

#[cfg(test)]
mod tests {
    use super::CrmError;

    #[test]
    fn retryable_classification_matches_status_families() {
        let http = |status| CrmError::Http { status, body: String::new() };

        assert!(CrmError::Transport("connection reset".to_string()).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(http(408).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(429).is_rate_limited());
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(http(401).is_unauthorized());
        assert!(!CrmError::Decode("eof".to_string()).is_retryable());
    }
}
