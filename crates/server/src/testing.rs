//! Scripted CRM and model fakes shared by the handler tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use outreach_agent::{
    AgentRuntime, CompletionRequest, Drafter, DrafterSettings, LlmClient, LlmError,
    ModelSelection, PromptBuilder, RuntimeSettings,
};
use outreach_core::config::LlmProvider;
use outreach_core::domain::conversation::{
    Conversation, ConversationId, Message, Prospect, Sender,
};
use outreach_core::domain::draft::{Draft, DraftStatus};
use outreach_core::domain::run::RunId;
use outreach_core::knowledge::KnowledgeBase;
use outreach_db::Store;
use outreach_heyreach::{
    Chatroom, ConversationPage, ConversationQuery, CrmClient, CrmError, OutboundMessage,
    StatsQuery, TagRequest,
};

use crate::state::{AppState, ServerSettings};

pub const REPLY_TEXT: &str = "Great to hear Ana! What role are you hiring for right now?";

#[derive(Default)]
pub struct FakeCrm {
    pub conversations: Mutex<Vec<Conversation>>,
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub fail_sends: bool,
    pub key_rejected: bool,
}

impl FakeCrm {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("sent").clone()
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn check_api_key(&self) -> Result<(), CrmError> {
        if self.key_rejected {
            return Err(CrmError::Http { status: 401, body: "invalid key".to_string() });
        }
        Ok(())
    }

    async fn list_conversations(
        &self,
        _query: &ConversationQuery,
    ) -> Result<ConversationPage, CrmError> {
        let conversations = std::mem::take(&mut *self.conversations.lock().expect("conversations"));
        Ok(ConversationPage { total_count: None, conversations })
    }

    async fn get_chatroom(
        &self,
        _account_id: i64,
        _conversation_id: &ConversationId,
    ) -> Result<Chatroom, CrmError> {
        Ok(Chatroom::default())
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<(), CrmError> {
        if self.fail_sends {
            return Err(CrmError::Http { status: 500, body: "upstream down".to_string() });
        }
        self.sent.lock().expect("sent").push(message.clone());
        Ok(())
    }

    async fn add_tags(&self, _request: &TagRequest) -> Result<(), CrmError> {
        Ok(())
    }

    async fn overall_stats(&self, _query: &StatsQuery) -> Result<Value, CrmError> {
        Ok(json!({ "messagesSent": 12, "replies": 3 }))
    }
}

/// Always answers with a confident, short engagement.
struct FakeLlm;

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Ok(json!({
            "analysis": {
                "intent": "interest",
                "emotion": "warm",
                "energy_level": "minimal",
                "deal_stage": "ENGAGED",
                "language": "en"
            },
            "action": "ENGAGE",
            "reasoning": "prospect replied warmly",
            "message": REPLY_TEXT,
            "confidence": 0.92,
            "guardrail_check": {
                "no_false_free_claims": true,
                "no_fabricated_features": true,
                "appropriate_length": true,
                "energy_matched": true,
                "required_links_included": true
            }
        })
        .to_string())
    }
}

pub fn settings(password: Option<&str>, send_enabled: bool) -> ServerSettings {
    ServerSettings {
        environment: "test".to_string(),
        dashboard_password: password.map(|value| value.to_string().into()),
        send_enabled,
        auto_approve_confidence: 0.85,
        max_messages_per_run: 30,
        account_ids: vec![94526],
        campaign_ids: vec![274509],
    }
}

pub fn state_with(crm: Arc<FakeCrm>, settings: ServerSettings) -> AppState {
    let store = Store::in_memory();
    let prompts = PromptBuilder::new(KnowledgeBase::default()).expect("prompt templates");
    let drafter = Drafter::new(
        Arc::new(FakeLlm),
        prompts,
        DrafterSettings {
            models: ModelSelection {
                primary: "primary-model".to_string(),
                review: "review-model".to_string(),
            },
            review_enabled: false,
            max_tokens: 512,
        },
    );
    let runtime = AgentRuntime::new(
        crm.clone(),
        drafter,
        store.clone(),
        RuntimeSettings {
            account_ids: settings.account_ids.clone(),
            campaign_ids: settings.campaign_ids.clone(),
            fetch_limit: 25,
            send_enabled: settings.send_enabled,
            auto_approve_confidence: settings.auto_approve_confidence,
            max_messages_per_run: settings.max_messages_per_run,
            escalation_tag: None,
        },
    );

    AppState::new(settings, store, crm, Arc::new(runtime))
}

pub fn state_with_password(password: &str) -> AppState {
    state_with(Arc::new(FakeCrm::default()), settings(Some(password), false))
}

pub fn state_without_password() -> AppState {
    state_with(Arc::new(FakeCrm::default()), settings(None, false))
}

pub fn app(state: AppState) -> Router {
    crate::app(state)
}

pub fn awaiting_conversation(id: &str) -> Conversation {
    Conversation {
        id: ConversationId(id.to_string()),
        account_id: 94526,
        campaign_id: Some(274509),
        prospect: Prospect {
            first_name: Some("Ana".to_string()),
            last_name: Some("Lopez".to_string()),
            ..Prospect::default()
        },
        tags: Vec::new(),
        messages: vec![
            Message {
                sender: Sender::Us,
                text: "Hi Ana, we found candidates for your open role".to_string(),
                sent_at: None,
            },
            Message { sender: Sender::Prospect, text: "Sounds good".to_string(), sent_at: None },
        ],
        last_sender: None,
    }
}

/// Stores a draft directly, bypassing a run.
pub async fn seed_draft(
    store: &Store,
    conversation_id: &str,
    status: DraftStatus,
    eligible: bool,
    minutes_ago: i64,
) -> Draft {
    let conversation = awaiting_conversation(conversation_id);
    let mut draft =
        Draft::new(RunId::generate(), &conversation, Utc::now() - Duration::minutes(minutes_ago));
    draft.status = status;
    draft.message = Some(REPLY_TEXT.to_string());
    draft.confidence = if eligible { 0.92 } else { 0.6 };
    draft.auto_approve_eligible = eligible;
    store.drafts.save(draft.clone()).await.expect("seed draft");
    draft
}
