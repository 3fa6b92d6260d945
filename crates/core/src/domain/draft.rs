use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::{Conversation, ConversationId, Prospect};
use crate::domain::decision::{Action, Analysis, GuardrailCheck};
use crate::domain::run::RunId;
use crate::errors::DomainError;
use crate::knowledge::{CampaignType, Language, SentMaterials};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub String);

impl DraftId {
    pub fn generate() -> Self {
        Self(format!("draft_{}", Uuid::new_v4().simple()))
    }
}

impl std::fmt::Display for DraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Ready,
    PendingApproval,
    Sent,
    Rejected,
    Escalated,
    Skipped,
    Error,
}

impl DraftStatus {
    /// Statuses a human still has to act on.
    pub const AWAITING_DECISION: [DraftStatus; 3] =
        [DraftStatus::Ready, DraftStatus::PendingApproval, DraftStatus::Escalated];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::PendingApproval => "pending_approval",
            Self::Sent => "sent",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }

    pub fn is_awaiting_decision(self) -> bool {
        Self::AWAITING_DECISION.contains(&self)
    }
}

impl std::str::FromStr for DraftStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ready" | "draft" => Ok(Self::Ready),
            "pending_approval" | "pending" => Ok(Self::PendingApproval),
            "sent" => Ok(Self::Sent),
            "rejected" => Ok(Self::Rejected),
            "escalated" => Ok(Self::Escalated),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown draft status `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub run_id: RunId,
    pub conversation_id: ConversationId,
    pub account_id: i64,
    pub campaign_id: Option<i64>,
    pub prospect: Prospect,
    pub prospect_name: String,
    pub last_prospect_message: Option<String>,
    pub status: DraftStatus,
    pub action: Option<Action>,
    pub reasoning: Option<String>,
    pub message: Option<String>,
    pub confidence: f64,
    pub analysis: Option<Analysis>,
    pub guardrail_check: Option<GuardrailCheck>,
    pub validation: Option<ValidationReport>,
    pub campaign: Option<CampaignType>,
    pub language: Option<Language>,
    pub reviewed: bool,
    pub review_error: Option<String>,
    pub original_confidence: Option<f64>,
    pub parse_error: Option<String>,
    pub sent_materials: Option<SentMaterials>,
    pub auto_approve_eligible: bool,
    pub auto_approved: bool,
    pub final_message: Option<String>,
    pub rejection_reason: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl Draft {
    /// Starts a draft for `conversation`. The status is provisional until the runtime settles it.
    pub fn new(run_id: RunId, conversation: &Conversation, now: DateTime<Utc>) -> Self {
        Self {
            id: DraftId::generate(),
            run_id,
            conversation_id: conversation.id.clone(),
            account_id: conversation.account_id,
            campaign_id: conversation.campaign_id,
            prospect: conversation.prospect.clone(),
            prospect_name: conversation.prospect.display_name(),
            last_prospect_message: conversation
                .last_prospect_message()
                .map(|message| message.text.clone()),
            status: DraftStatus::Skipped,
            action: None,
            reasoning: None,
            message: None,
            confidence: 0.0,
            analysis: None,
            guardrail_check: None,
            validation: None,
            campaign: None,
            language: None,
            reviewed: false,
            review_error: None,
            original_confidence: None,
            parse_error: None,
            sent_materials: None,
            auto_approve_eligible: false,
            auto_approved: false,
            final_message: None,
            rejection_reason: None,
            error: None,
            created_at: now,
            sent_at: None,
            rejected_at: None,
        }
    }

    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        matches!(
            (self.status, next),
            (
                DraftStatus::Ready | DraftStatus::PendingApproval | DraftStatus::Escalated,
                DraftStatus::Sent | DraftStatus::Rejected
            )
        )
    }

    pub fn transition_to(&mut self, next: DraftStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDraftTransition { from: self.status, to: next })
    }

    /// The text that would go out on approval, preferring an operator edit.
    pub fn outgoing_text(&self) -> Option<&str> {
        self.final_message
            .as_deref()
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn mark_sent(
        &mut self,
        final_message: String,
        auto_approved: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(DraftStatus::Sent)?;
        self.final_message = Some(final_message);
        self.auto_approved = auto_approved;
        self.sent_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition_to(DraftStatus::Rejected)?;
        self.rejection_reason = Some(reason);
        self.rejected_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::conversation::{Conversation, ConversationId, Message, Prospect, Sender};
    use crate::domain::run::RunId;
    use crate::errors::DomainError;

    use super::{Draft, DraftStatus};

    fn draft(status: DraftStatus) -> Draft {
        let conversation = Conversation {
            id: ConversationId("conv-7".to_string()),
            account_id: 94526,
            campaign_id: None,
            prospect: Prospect { first_name: Some("Eva".to_string()), ..Prospect::default() },
            tags: Vec::new(),
            messages: vec![Message {
                sender: Sender::Prospect,
                text: "sounds good".to_string(),
                sent_at: None,
            }],
            last_sender: None,
        };
        let mut draft = Draft::new(RunId::generate(), &conversation, Utc::now());
        draft.status = status;
        draft.message = Some("Great, here is the link".to_string());
        draft
    }

    #[test]
    fn new_draft_captures_conversation_context() {
        let draft = draft(DraftStatus::Ready);
        assert_eq!(draft.prospect_name, "Eva");
        assert_eq!(draft.last_prospect_message.as_deref(), Some("sounds good"));
        assert!(draft.id.0.starts_with("draft_"));
    }

    #[test]
    fn awaiting_statuses_can_be_sent_or_rejected() {
        for status in DraftStatus::AWAITING_DECISION {
            assert!(draft(status).can_transition_to(DraftStatus::Sent));
            assert!(draft(status).can_transition_to(DraftStatus::Rejected));
        }
    }

    #[test]
    fn terminal_statuses_refuse_transitions() {
        let terminal_statuses =
            [DraftStatus::Sent, DraftStatus::Rejected, DraftStatus::Skipped, DraftStatus::Error];
        for status in terminal_statuses {
            let mut terminal = draft(status);
            let result = terminal.transition_to(DraftStatus::Sent);
            assert_eq!(
                result,
                Err(DomainError::InvalidDraftTransition { from: status, to: DraftStatus::Sent })
            );
        }
    }

    #[test]
    fn mark_sent_records_final_message_and_timestamp() {
        let mut draft = draft(DraftStatus::PendingApproval);
        draft.mark_sent("Edited text".to_string(), false, Utc::now()).expect("send transition");

        assert_eq!(draft.status, DraftStatus::Sent);
        assert_eq!(draft.final_message.as_deref(), Some("Edited text"));
        assert!(draft.sent_at.is_some());
        assert!(draft.reject("late".to_string(), Utc::now()).is_err());
    }

    #[test]
    fn outgoing_text_prefers_operator_edit() {
        let mut draft = draft(DraftStatus::Ready);
        assert_eq!(draft.outgoing_text(), Some("Great, here is the link"));

        draft.final_message = Some("  ".to_string());
        assert_eq!(draft.outgoing_text(), None);

        draft.final_message = Some("Edited".to_string());
        assert_eq!(draft.outgoing_text(), Some("Edited"));
    }

    #[test]
    fn status_parses_from_query_values() {
        assert_eq!("pending_approval".parse::<DraftStatus>(), Ok(DraftStatus::PendingApproval));
        assert_eq!("draft".parse::<DraftStatus>(), Ok(DraftStatus::Ready));
        assert!("bogus".parse::<DraftStatus>().is_err());
    }
}
