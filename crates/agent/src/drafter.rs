use std::sync::Arc;

use tracing::{info, warn};

use outreach_core::config::LlmConfig;
use outreach_core::domain::conversation::Conversation;
use outreach_core::domain::decision::AgentDecision;

use crate::llm::{CompletionRequest, LlmClient, LlmError, ModelSelection};
use crate::prompts::{ConversationContext, PromptBuilder};
use crate::response::parse_decision;
use crate::review::{adopt_review, review_failed, review_trigger};
use crate::schema::response_schema;

#[derive(Clone, Debug, PartialEq)]
pub struct DrafterSettings {
    pub models: ModelSelection,
    pub review_enabled: bool,
    pub max_tokens: u32,
}

impl DrafterSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            models: ModelSelection::from_config(config),
            review_enabled: config.review_enabled,
            max_tokens: config.max_tokens,
        }
    }
}

/// Classifies a conversation and drafts a reply, with an optional second opinion.
pub struct Drafter {
    llm: Arc<dyn LlmClient>,
    prompts: PromptBuilder,
    settings: DrafterSettings,
}

impl Drafter {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptBuilder, settings: DrafterSettings) -> Self {
        let prompts = prompts.with_retrieval(llm.retrieval_enabled());
        Self { llm, prompts, settings }
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Never fails: provider and parse failures come back as escalations.
    pub async fn draft(
        &self,
        correlation_id: &str,
        conversation: &Conversation,
        context: &ConversationContext,
    ) -> AgentDecision {
        let primary = match self.primary(conversation, context).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    event_name = "agent.draft.provider_failed",
                    correlation_id = %correlation_id,
                    conversation_id = %conversation.id,
                    error = %error,
                    "primary draft failed, escalating"
                );
                return AgentDecision::escalate(format!("API error: {error}"), error.to_string());
            }
        };

        if !self.settings.review_enabled {
            return primary;
        }
        let Some(trigger) = review_trigger(&primary) else {
            return primary;
        };

        info!(
            event_name = "agent.review.started",
            correlation_id = %correlation_id,
            conversation_id = %conversation.id,
            trigger = trigger.as_str(),
            model = %self.settings.models.review,
            "running secondary review"
        );

        match self.review(conversation, context, &primary).await {
            Ok(reviewed) => adopt_review(&primary, reviewed),
            Err(error) => {
                warn!(
                    event_name = "agent.review.failed",
                    correlation_id = %correlation_id,
                    conversation_id = %conversation.id,
                    error = %error,
                    "secondary review failed, keeping primary draft"
                );
                review_failed(primary, error.to_string())
            }
        }
    }

    async fn primary(
        &self,
        conversation: &Conversation,
        context: &ConversationContext,
    ) -> Result<AgentDecision, LlmError> {
        let request = CompletionRequest {
            model: self.settings.models.primary.clone(),
            system: Some(self.prompts.system_prompt(context)?),
            user: self.prompts.user_prompt(conversation, context)?,
            schema: Some(response_schema()),
            max_tokens: self.settings.max_tokens,
        };

        let raw = self.llm.complete(&request).await?;
        Ok(parse_decision(&raw))
    }

    async fn review(
        &self,
        conversation: &Conversation,
        context: &ConversationContext,
        primary: &AgentDecision,
    ) -> Result<AgentDecision, LlmError> {
        let request = CompletionRequest {
            model: self.settings.models.review.clone(),
            system: None,
            user: self.prompts.review_prompt(conversation, context, primary)?,
            schema: Some(response_schema()),
            max_tokens: self.settings.max_tokens,
        };

        let raw = self.llm.complete(&request).await?;
        Ok(parse_decision(&raw))
    }
}
