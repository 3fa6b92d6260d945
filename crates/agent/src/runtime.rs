//! The processing loop: fetch unseen conversations, draft, validate, then send
//! or queue each one.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use outreach_core::config::AppConfig;
use outreach_core::domain::conversation::Conversation;
use outreach_core::domain::decision::{Action, AgentDecision};
use outreach_core::domain::draft::{Draft, DraftStatus};
use outreach_core::domain::run::{Run, RunErrorEntry, RunErrorKind, RunId, RunMode, RunSummary};
use outreach_db::{RepositoryError, Store};
use outreach_heyreach::{ConversationQuery, CrmClient, OutboundMessage, TagRequest};

use crate::drafter::Drafter;
use crate::guardrails::{validate_reply, ValidationContext};

/// Runs (and their settled drafts) kept in memory; drafts awaiting a decision are always kept.
pub const RETAINED_RUNS: usize = 50;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("a processing run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub account_ids: Vec<i64>,
    pub campaign_ids: Vec<i64>,
    pub fetch_limit: u32,
    pub send_enabled: bool,
    pub auto_approve_confidence: f64,
    pub max_messages_per_run: u32,
    pub escalation_tag: Option<String>,
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            account_ids: config.heyreach.account_ids.clone(),
            campaign_ids: config.heyreach.campaign_ids.clone(),
            fetch_limit: config.heyreach.fetch_limit,
            send_enabled: config.processing.send_enabled,
            auto_approve_confidence: config.processing.auto_approve_confidence,
            max_messages_per_run: config.processing.max_messages_per_run,
            escalation_tag: config.processing.escalation_tag.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Overrides the configured per-run send cap.
    pub max_messages: Option<u32>,
}

impl RunOptions {
    pub fn dry_run() -> Self {
        Self { mode: RunMode::DryRun, max_messages: None }
    }

    pub fn live() -> Self {
        Self { mode: RunMode::Live, max_messages: None }
    }
}

pub struct AgentRuntime {
    crm: Arc<dyn CrmClient>,
    drafter: Drafter,
    store: Store,
    settings: RuntimeSettings,
    run_guard: Mutex<()>,
}

impl AgentRuntime {
    pub fn new(
        crm: Arc<dyn CrmClient>,
        drafter: Drafter,
        store: Store,
        settings: RuntimeSettings,
    ) -> Self {
        Self { crm, drafter, store, settings, run_guard: Mutex::new(()) }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Executes one run. A second call while a run is in flight is rejected, not queued.
    pub async fn process(&self, options: RunOptions) -> Result<Run, RuntimeError> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            return Err(RuntimeError::AlreadyRunning);
        };

        let run_id = RunId::generate();
        let started_at = Utc::now();
        let max_messages = options.max_messages.unwrap_or(self.settings.max_messages_per_run);
        info!(
            event_name = "agent.run.started",
            correlation_id = %run_id,
            mode = ?options.mode,
            max_messages,
            "processing run started"
        );

        let mut summary = RunSummary::default();
        let mut errors = Vec::new();
        let mut draft_ids = Vec::new();

        let query = ConversationQuery::unseen(
            self.settings.account_ids.clone(),
            self.settings.campaign_ids.clone(),
            self.settings.fetch_limit,
        );
        match self.crm.list_conversations(&query).await {
            Ok(page) => {
                summary.fetched = count(page.conversations.len());
                for conversation in page.conversations {
                    if summary.sent >= max_messages {
                        info!(
                            event_name = "agent.run.message_cap_reached",
                            correlation_id = %run_id,
                            max_messages,
                            "message cap reached, stopping run"
                        );
                        break;
                    }

                    let draft = self.process_one(&run_id, options.mode, conversation).await;
                    summary.processed += 1;
                    tally(&mut summary, &draft);
                    if draft.status == DraftStatus::Error {
                        errors.push(RunErrorEntry {
                            kind: RunErrorKind::Conversation,
                            conversation_id: Some(draft.conversation_id.clone()),
                            message: draft.error.clone().unwrap_or_default(),
                        });
                    }

                    draft_ids.push(draft.id.clone());
                    self.store.drafts.save(draft).await?;
                }
            }
            Err(error) => {
                warn!(
                    event_name = "agent.run.fetch_failed",
                    correlation_id = %run_id,
                    error = %error,
                    "could not fetch conversations"
                );
                errors.push(RunErrorEntry {
                    kind: RunErrorKind::Fatal,
                    conversation_id: None,
                    message: error.to_string(),
                });
            }
        }

        let finished_at = Utc::now();
        let run = Run {
            id: run_id,
            mode: options.mode,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            summary,
            errors,
            draft_ids,
        };
        self.store.runs.save(run.clone()).await?;
        match self.store.prune(RETAINED_RUNS).await {
            Ok(0) => {}
            Ok(pruned) => info!(
                event_name = "agent.store.pruned",
                correlation_id = %run.id,
                pruned,
                "settled drafts from older runs dropped"
            ),
            Err(error) => warn!(
                event_name = "agent.store.prune_failed",
                correlation_id = %run.id,
                error = %error,
                "could not prune stored drafts"
            ),
        }

        info!(
            event_name = "agent.run.completed",
            correlation_id = %run.id,
            fetched = run.summary.fetched,
            drafted = run.summary.drafted,
            sent = run.summary.sent,
            skipped = run.summary.skipped,
            escalated = run.summary.escalated,
            errors = run.summary.errors,
            duration_ms = run.duration_ms,
            "processing run completed"
        );
        Ok(run)
    }

    async fn process_one(
        &self,
        run_id: &RunId,
        mode: RunMode,
        mut conversation: Conversation,
    ) -> Draft {
        let mut draft = Draft::new(run_id.clone(), &conversation, Utc::now());

        if !conversation.awaiting_reply() {
            draft.reasoning = Some("Last message was not sent by the prospect".to_string());
            return draft;
        }

        if conversation.messages.is_empty() {
            match self.crm.get_chatroom(conversation.account_id, &conversation.id).await {
                Ok(chatroom) => {
                    conversation.merge_chatroom(chatroom.prospect, chatroom.messages);
                    draft = Draft::new(run_id.clone(), &conversation, draft.created_at);
                }
                Err(error) => {
                    draft.status = DraftStatus::Error;
                    draft.error = Some(format!("Chatroom fetch failed: {error}"));
                    return draft;
                }
            }
        }

        if conversation.last_prospect_message().is_none() {
            draft.reasoning = Some("No prospect message to respond to".to_string());
            return draft;
        }

        let context = self.drafter.prompts().analyze(&conversation);
        draft.campaign = Some(context.campaign);
        draft.language = Some(context.language);
        draft.sent_materials = Some(context.sent_materials.clone());

        let decision = self.drafter.draft(&draft.id.0, &conversation, &context).await;
        apply_decision(&mut draft, &decision);

        match decision.action {
            Action::Hold => return draft,
            Action::Escalate => {
                draft.status = DraftStatus::Escalated;
                self.tag_escalation(&draft).await;
                return draft;
            }
            Action::Close if decision.message.is_none() => return draft,
            _ => {}
        }

        let Some(message) = decision.message.clone() else {
            draft.status = DraftStatus::Error;
            draft.error = Some("No message generated".to_string());
            return draft;
        };

        let report = validate_reply(
            &message,
            ValidationContext {
                campaign: context.campaign,
                prospect_word_count: context.prospect_word_count,
            },
        );
        if !report.valid {
            draft.status = DraftStatus::Error;
            draft.error = Some(format!("Guardrail violation: {}", report.errors.join(", ")));
            warn!(
                event_name = "agent.draft.guardrail_violation",
                correlation_id = %draft.id,
                conversation_id = %draft.conversation_id,
                errors = %report.errors.join(", "),
                "draft blocked by guardrails"
            );
            draft.validation = Some(report);
            return draft;
        }

        let eligible = self.auto_approve_eligible(&decision, report.warnings.is_empty());
        draft.validation = Some(report);
        draft.auto_approve_eligible = eligible;
        draft.status = DraftStatus::Ready;

        if mode.is_dry_run() {
            return draft;
        }
        if !(eligible && self.settings.send_enabled) {
            draft.status = DraftStatus::PendingApproval;
            return draft;
        }

        let outbound = OutboundMessage {
            account_id: draft.account_id,
            conversation_id: draft.conversation_id.clone(),
            message: message.clone(),
        };
        match self.crm.send_message(&outbound).await {
            Ok(()) => {
                if let Err(error) = draft.mark_sent(message, true, Utc::now()) {
                    draft.status = DraftStatus::Error;
                    draft.error = Some(error.to_string());
                    return draft;
                }
                info!(
                    event_name = "agent.draft.auto_sent",
                    correlation_id = %draft.id,
                    conversation_id = %draft.conversation_id,
                    "auto-approved draft sent"
                );
            }
            Err(error) => {
                draft.status = DraftStatus::Error;
                draft.error = Some(format!("Send failed: {error}"));
            }
        }
        draft
    }

    fn auto_approve_eligible(&self, decision: &AgentDecision, no_warnings: bool) -> bool {
        decision.confidence >= self.settings.auto_approve_confidence
            && decision.guardrail_check.as_ref().map_or(true, |check| check.all_passed())
            && no_warnings
            && !decision.routed_to_review()
            && decision.action.auto_approvable()
    }

    async fn tag_escalation(&self, draft: &Draft) {
        let (Some(tag), Some(profile_url)) =
            (self.settings.escalation_tag.as_ref(), draft.prospect.profile_url.as_ref())
        else {
            return;
        };

        let request = TagRequest {
            profile_url: profile_url.clone(),
            tags: vec![tag.clone()],
            create_if_missing: true,
        };
        if let Err(error) = self.crm.add_tags(&request).await {
            warn!(
                event_name = "agent.draft.escalation_tag_failed",
                correlation_id = %draft.id,
                error = %error,
                "could not tag escalated lead"
            );
        }
    }
}

fn apply_decision(draft: &mut Draft, decision: &AgentDecision) {
    draft.action = Some(decision.action);
    draft.reasoning = Some(decision.reasoning.clone());
    draft.message = decision.message.clone();
    draft.confidence = decision.confidence;
    draft.analysis = Some(decision.analysis.clone());
    draft.guardrail_check = decision.guardrail_check.clone();
    draft.reviewed = decision.reviewed;
    draft.review_error = decision.review_error.clone();
    draft.original_confidence = decision.original_confidence;
    draft.parse_error = decision.parse_error.clone();
}

fn tally(summary: &mut RunSummary, draft: &Draft) {
    match draft.status {
        DraftStatus::Ready | DraftStatus::PendingApproval => summary.drafted += 1,
        DraftStatus::Sent => {
            summary.sent += 1;
            if draft.auto_approved {
                summary.auto_approved += 1;
            }
        }
        DraftStatus::Skipped => summary.skipped += 1,
        DraftStatus::Escalated => summary.escalated += 1,
        DraftStatus::Error => summary.errors += 1,
        DraftStatus::Rejected => {}
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
