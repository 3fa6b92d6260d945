//! Prompt rendering.
//!
//! One template set serves every provider. Templates are compiled into the
//! binary and rendered from typed contexts, so a missing variable is a render
//! error rather than an empty string in front of the model.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use outreach_core::config::LinksConfig;
use outreach_core::domain::conversation::{Conversation, Sender};
use outreach_core::domain::decision::AgentDecision;
use outreach_core::knowledge::{
    detect_language, word_count, CampaignType, EnergyLevel, KnowledgeBase, Language,
    SentMaterials, CONTACT_PRICE,
};

const SYSTEM_TEMPLATE: &str = "system.tera";
const USER_TEMPLATE: &str = "user.tera";
const REVIEW_TEMPLATE: &str = "review.tera";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to load prompt templates: {0}")]
    Load(tera::Error),
    #[error("failed to render prompt `{template}`: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// Facts derived from a conversation that drive prompting and validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationContext {
    pub campaign: CampaignType,
    pub language: Language,
    pub prospect_word_count: usize,
    pub energy: EnergyLevel,
    pub sent_materials: SentMaterials,
}

impl ConversationContext {
    pub fn analyze(knowledge: &KnowledgeBase, conversation: &Conversation) -> Self {
        let last_text =
            conversation.last_prospect_message().map(|message| message.text.as_str()).unwrap_or("");
        let prospect_word_count = word_count(last_text);

        Self {
            campaign: knowledge.campaigns.detect(conversation),
            language: detect_language(last_text),
            prospect_word_count,
            energy: EnergyLevel::from_word_count(prospect_word_count),
            sent_materials: SentMaterials::from_conversation(conversation),
        }
    }
}

#[derive(Debug, Serialize)]
struct CampaignView<'a> {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    is_cazvid: bool,
    job_posting_link: &'a str,
    tutorial_link: &'a str,
}

#[derive(Debug, Serialize)]
struct LanguageView {
    code: &'static str,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct PricingView {
    contact_price: &'static str,
}

#[derive(Debug, Serialize)]
struct ProspectView {
    first_name: String,
    full_name: String,
    headline: String,
    company: String,
    location: String,
    tags: String,
}

#[derive(Debug, Serialize)]
struct HistoryLine<'a> {
    label: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct FlagsView {
    sent_candidates: &'static str,
    sent_job_link: &'static str,
    sent_pricing: &'static str,
    sent_tutorial: &'static str,
    sent_calendly: &'static str,
}

#[derive(Debug, Serialize)]
struct EnergyView {
    word_count: usize,
    label: &'static str,
    budget_hint: &'static str,
    reply_range: &'static str,
}

#[derive(Debug, Serialize)]
struct DraftView<'a> {
    action: &'static str,
    message: &'a str,
    confidence: f64,
    reasoning: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptView<'a> {
    campaign: CampaignView<'a>,
    language: LanguageView,
    pricing: PricingView,
    links: &'a LinksConfig,
    prospect: ProspectView,
    history: Vec<HistoryLine<'a>>,
    flags: FlagsView,
    energy: EnergyView,
    retrieval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<DraftView<'a>>,
}

pub struct PromptBuilder {
    tera: Tera,
    knowledge: KnowledgeBase,
    retrieval: bool,
}

impl PromptBuilder {
    pub fn new(knowledge: KnowledgeBase) -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (SYSTEM_TEMPLATE, include_str!("../templates/system.tera")),
            (USER_TEMPLATE, include_str!("../templates/user.tera")),
            (REVIEW_TEMPLATE, include_str!("../templates/review.tera")),
        ])
        .map_err(PromptError::Load)?;

        Ok(Self { tera, knowledge, retrieval: false })
    }

    /// Tells the model a retrieval tool is attached to the request.
    pub fn with_retrieval(mut self, enabled: bool) -> Self {
        self.retrieval = enabled;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn analyze(&self, conversation: &Conversation) -> ConversationContext {
        ConversationContext::analyze(&self.knowledge, conversation)
    }

    pub fn system_prompt(&self, context: &ConversationContext) -> Result<String, PromptError> {
        let view = self.view(None, context, None);
        self.render(SYSTEM_TEMPLATE, &view)
    }

    pub fn user_prompt(
        &self,
        conversation: &Conversation,
        context: &ConversationContext,
    ) -> Result<String, PromptError> {
        let view = self.view(Some(conversation), context, None);
        self.render(USER_TEMPLATE, &view)
    }

    pub fn review_prompt(
        &self,
        conversation: &Conversation,
        context: &ConversationContext,
        draft: &AgentDecision,
    ) -> Result<String, PromptError> {
        let draft = DraftView {
            action: draft.action.as_str(),
            message: draft.message.as_deref().unwrap_or("None"),
            confidence: draft.confidence,
            reasoning: &draft.reasoning,
        };
        let view = self.view(Some(conversation), context, Some(draft));
        self.render(REVIEW_TEMPLATE, &view)
    }

    fn render(&self, template: &'static str, view: &PromptView<'_>) -> Result<String, PromptError> {
        let context = Context::from_serialize(view)
            .map_err(|source| PromptError::Render { template, source })?;
        self.tera
            .render(template, &context)
            .map_err(|source| PromptError::Render { template, source })
    }

    fn view<'a>(
        &'a self,
        conversation: Option<&'a Conversation>,
        context: &ConversationContext,
        draft: Option<DraftView<'a>>,
    ) -> PromptView<'a> {
        let campaign = context.campaign;
        let language = context.language;
        let sent = &context.sent_materials;

        PromptView {
            campaign: CampaignView {
                key: campaign_key(campaign),
                name: campaign.display_name(),
                description: campaign.description(),
                is_cazvid: campaign == CampaignType::CazVid,
                job_posting_link: self.knowledge.job_posting_link(language),
                tutorial_link: self.knowledge.tutorial_link(language),
            },
            language: LanguageView { code: language.code(), name: language.name() },
            pricing: PricingView { contact_price: CONTACT_PRICE },
            links: &self.knowledge.links,
            prospect: conversation.map(prospect_view).unwrap_or_else(empty_prospect),
            history: conversation.map(history).unwrap_or_default(),
            flags: FlagsView {
                sent_candidates: yes_no(sent.candidates),
                sent_job_link: yes_no(sent.job_link),
                sent_pricing: yes_no(sent.pricing),
                sent_tutorial: yes_no(sent.tutorial),
                sent_calendly: yes_no(sent.calendly),
            },
            energy: EnergyView {
                word_count: context.prospect_word_count,
                label: context.energy.label(),
                budget_hint: context.energy.budget_hint(),
                reply_range: reply_range(context.energy),
            },
            retrieval: self.retrieval,
            draft,
        }
    }
}

fn campaign_key(campaign: CampaignType) -> &'static str {
    match campaign {
        CampaignType::CazVid => "cazvid",
        CampaignType::AgencyLeads => "agency_leads",
    }
}

fn reply_range(energy: EnergyLevel) -> &'static str {
    match energy {
        EnergyLevel::Minimal => "15-35 words MAX",
        EnergyLevel::Brief => "30-60 words MAX",
        EnergyLevel::Engaged => "50-100 words MAX",
        EnergyLevel::Detailed => "Full response OK",
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn prospect_view(conversation: &Conversation) -> ProspectView {
    let prospect = &conversation.prospect;
    let text = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
    let tags = if conversation.tags.is_empty() {
        "none".to_string()
    } else {
        conversation.tags.join(", ")
    };

    ProspectView {
        first_name: prospect.greeting_name().unwrap_or("there").to_string(),
        full_name: prospect.display_name(),
        headline: text(&prospect.headline),
        company: text(&prospect.company),
        location: text(&prospect.location),
        tags,
    }
}

fn empty_prospect() -> ProspectView {
    ProspectView {
        first_name: "there".to_string(),
        full_name: String::new(),
        headline: String::new(),
        company: String::new(),
        location: String::new(),
        tags: "none".to_string(),
    }
}

fn history(conversation: &Conversation) -> Vec<HistoryLine<'_>> {
    conversation
        .messages
        .iter()
        .map(|message| HistoryLine {
            label: match message.sender {
                Sender::Us => "US",
                Sender::Prospect => "PROSPECT",
            },
            text: message.text.as_str(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use outreach_core::domain::conversation::{
        Conversation, ConversationId, Message, Prospect, Sender,
    };
    use outreach_core::domain::decision::{Action, AgentDecision};
    use outreach_core::knowledge::{CampaignType, EnergyLevel, KnowledgeBase, Language};

    use super::PromptBuilder;

    fn conversation(messages: &[(Sender, &str)]) -> Conversation {
        Conversation {
            id: ConversationId("conv-1".to_string()),
            account_id: 7,
            campaign_id: None,
            prospect: Prospect {
                first_name: Some("Ana".to_string()),
                last_name: Some("Ruiz".to_string()),
                company: Some("Grupo Norte".to_string()),
                ..Prospect::default()
            },
            tags: vec!["hot".to_string()],
            messages: messages
                .iter()
                .map(|(sender, text)| Message {
                    sender: *sender,
                    text: text.to_string(),
                    sent_at: None,
                })
                .collect(),
            last_sender: None,
        }
    }

    fn builder() -> PromptBuilder {
        PromptBuilder::new(KnowledgeBase::default()).expect("templates compile")
    }

    #[test]
    fn analyze_reads_last_prospect_message() {
        let conversation = conversation(&[
            (Sender::Us, "Hola Ana, te comparto candidatos: https://cazvid.com/es/x"),
            (Sender::Prospect, "Hola, gracias por los perfiles"),
        ]);

        let context = builder().analyze(&conversation);
        assert_eq!(context.campaign, CampaignType::CazVid);
        assert_eq!(context.language, Language::Es);
        assert_eq!(context.prospect_word_count, 5);
        assert_eq!(context.energy, EnergyLevel::Minimal);
        assert!(context.sent_materials.candidates);
    }

    #[test]
    fn system_prompt_carries_language_links_and_pricing() {
        let conversation = conversation(&[(Sender::Prospect, "Thanks, tell me more")]);
        let builder = builder().with_retrieval(true);
        let context = builder.analyze(&conversation);

        let prompt = builder.system_prompt(&context).expect("system prompt");
        assert!(prompt.contains("LANGUAGE: ENGLISH"));
        assert!(prompt.contains("$50 USD/month"));
        assert!(prompt.contains("https://calendly.com/"));
        assert!(prompt.contains("{{firstName}}"));
        assert!(prompt.contains("file_search"));

        let without_retrieval = PromptBuilder::new(KnowledgeBase::default())
            .expect("templates")
            .system_prompt(&context)
            .expect("system prompt");
        assert!(!without_retrieval.contains("file_search"));
    }

    #[test]
    fn user_prompt_labels_history_and_flags() {
        let conversation = conversation(&[
            (Sender::Us, "Hi Ana, here are candidates for your role"),
            (Sender::Prospect, "Thanks"),
        ]);
        let builder = builder();
        let context = builder.analyze(&conversation);

        let prompt = builder.user_prompt(&conversation, &context).expect("user prompt");
        assert!(prompt.contains("- First Name: Ana"));
        assert!(prompt.contains("- Tags: hot"));
        assert!(prompt.contains("[US]: Hi Ana, here are candidates for your role"));
        assert!(prompt.contains("[PROSPECT]: Thanks"));
        assert!(prompt.contains("We already sent candidates: YES"));
        assert!(prompt.contains("Last message energy: MINIMAL"));
        assert!(prompt.contains("1 words = keep yours under 35"));
    }

    #[test]
    fn review_prompt_embeds_draft() {
        let conversation = conversation(&[(Sender::Prospect, "How much does it cost?")]);
        let builder = builder();
        let context = builder.analyze(&conversation);
        let mut draft = AgentDecision::escalate("pricing question", "n/a");
        draft.action = Action::Engage;
        draft.message = Some("Posting is free, contacting is $50/month.".to_string());
        draft.confidence = 0.6;

        let prompt = builder.review_prompt(&conversation, &context, &draft).expect("review prompt");
        assert!(prompt.contains("- Action: engage"));
        assert!(prompt.contains("Posting is free, contacting is $50/month."));
        assert!(prompt.contains("Expected response length: 15-35 words MAX"));
        assert!(prompt.contains("For CazVid advancement"));
    }
}
