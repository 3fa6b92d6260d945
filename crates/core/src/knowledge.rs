//! Campaign, language and pricing knowledge shared by prompt building and validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, LinksConfig};
use crate::domain::conversation::{Conversation, Sender};

pub const CONTACT_PRICE: &str = "$50 USD/month";

const SPANISH_INDICATORS: [&str; 17] = [
    "hola", "gracias", "cómo", "qué", "está", "bien", "bueno", "para", "con", "por", "que", "si",
    "no", "muy", "todo", "esta", "pero",
];

const CAZVID_KEYWORDS: [&str; 4] = ["cazvid", "video curriculum", "candidatos", "candidates"];
const AGENCY_LEADS_KEYWORDS: [&str; 4] = ["agency leads", "staffing", "recruitment", "demo"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignType {
    #[serde(rename = "cazvid")]
    CazVid,
    #[serde(rename = "agency_leads")]
    AgencyLeads,
}

impl CampaignType {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::CazVid => "CazVid",
            Self::AgencyLeads => "Agency Leads",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::CazVid => "CazVid - Video-based hiring platform for finding candidates",
            Self::AgencyLeads => "Agency Leads - Lead generation service for staffing agencies",
        }
    }

    /// Lower-case markers one of which must appear in an advancing reply.
    pub fn required_link_markers(self) -> &'static [&'static str] {
        match self {
            Self::CazVid => &["cazvid.app", "cazvid.com"],
            Self::AgencyLeads => &["calendly"],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::En => "ENGLISH",
            Self::Es => "SPANISH",
        }
    }
}

/// Spanish when at least two distinct indicator words appear as whole words.
pub fn detect_language(text: &str) -> Language {
    let lowered = text.to_lowercase();
    let tokens: HashSet<&str> =
        lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|token| !token.is_empty()).collect();

    let hits = SPANISH_INDICATORS.iter().filter(|word| tokens.contains(*word)).count();
    if hits >= 2 {
        Language::Es
    } else {
        Language::En
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Minimal,
    Brief,
    Engaged,
    Detailed,
}

impl EnergyLevel {
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..=10 => Self::Minimal,
            11..=25 => Self::Brief,
            26..=50 => Self::Engaged,
            _ => Self::Detailed,
        }
    }

    pub fn max_reply_words(self) -> Option<usize> {
        match self {
            Self::Minimal => Some(35),
            Self::Brief => Some(60),
            Self::Engaged => Some(100),
            Self::Detailed => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Minimal => "MINIMAL",
            Self::Brief => "BRIEF",
            Self::Engaged => "ENGAGED",
            Self::Detailed => "DETAILED",
        }
    }

    pub fn budget_hint(self) -> &'static str {
        match self {
            Self::Minimal => "keep yours under 35",
            Self::Brief => "keep yours under 60",
            Self::Engaged => "keep yours under 100",
            Self::Detailed => "full response OK",
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Materials our side already sent in a conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMaterials {
    pub job_link: bool,
    pub pricing: bool,
    pub calendly: bool,
    pub asked_decline_reason: bool,
    pub tutorial: bool,
    pub candidates: bool,
}

impl SentMaterials {
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let ours = conversation
            .messages
            .iter()
            .filter(|message| message.sender == Sender::Us)
            .map(|message| message.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            job_link: ours.contains("cazvid.app") || ours.contains("cazvid.com/"),
            pricing: ["$50", "50 dólares", "50 dolares"]
                .iter()
                .any(|needle| ours.contains(needle)),
            calendly: ours.contains("calendly.com"),
            asked_decline_reason: ours.contains("timing") && ours.contains("fit"),
            tutorial: ours.contains("youtube.com") || ours.contains("youtu.be"),
            candidates: ["cazvid.com/", "candidato", "candidate"]
                .iter()
                .any(|needle| ours.contains(needle)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignDirectory {
    pub cazvid: Vec<i64>,
    pub agency_leads: Vec<i64>,
}

impl CampaignDirectory {
    /// Configured campaign ids first, then conversation keywords, then CazVid.
    pub fn detect(&self, conversation: &Conversation) -> CampaignType {
        if let Some(campaign_id) = conversation.campaign_id {
            if self.cazvid.contains(&campaign_id) {
                return CampaignType::CazVid;
            }
            if self.agency_leads.contains(&campaign_id) {
                return CampaignType::AgencyLeads;
            }
        }

        let text = conversation.all_text().to_lowercase();
        if CAZVID_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
            return CampaignType::CazVid;
        }
        if AGENCY_LEADS_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
            return CampaignType::AgencyLeads;
        }

        CampaignType::CazVid
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeBase {
    pub campaigns: CampaignDirectory,
    pub links: LinksConfig,
}

impl KnowledgeBase {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            campaigns: CampaignDirectory {
                cazvid: config.processing.cazvid_campaign_ids.clone(),
                agency_leads: config.processing.agency_leads_campaign_ids.clone(),
            },
            links: config.links.clone(),
        }
    }

    pub fn job_posting_link(&self, language: Language) -> &str {
        match language {
            Language::Es => &self.links.cazvid_job_posting_es,
            Language::En => &self.links.cazvid_job_posting_en,
        }
    }

    pub fn tutorial_link(&self, language: Language) -> &str {
        match language {
            Language::Es => &self.links.cazvid_tutorial_es,
            Language::En => &self.links.cazvid_tutorial_en,
        }
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::{Conversation, ConversationId, Message, Prospect, Sender};

    use super::{
        detect_language, CampaignType, EnergyLevel, KnowledgeBase, Language, SentMaterials,
    };

    fn conversation(campaign_id: Option<i64>, messages: &[(Sender, &str)]) -> Conversation {
        Conversation {
            id: ConversationId("conv".to_string()),
            account_id: 1,
            campaign_id,
            prospect: Prospect::default(),
            tags: Vec::new(),
            messages: messages
                .iter()
                .map(|(sender, text)| Message {
                    sender: *sender,
                    text: (*text).to_string(),
                    sent_at: None,
                })
                .collect(),
            last_sender: None,
        }
    }

    #[test]
    fn campaign_ids_take_precedence_over_keywords() {
        let knowledge = KnowledgeBase::default();

        let agency = conversation(Some(223998), &[(Sender::Prospect, "show me candidates")]);
        assert_eq!(knowledge.campaigns.detect(&agency), CampaignType::AgencyLeads);

        let cazvid = conversation(Some(274509), &[(Sender::Prospect, "book a demo")]);
        assert_eq!(knowledge.campaigns.detect(&cazvid), CampaignType::CazVid);
    }

    #[test]
    fn unknown_campaign_falls_back_to_keywords_then_cazvid() {
        let knowledge = KnowledgeBase::default();

        let staffing = conversation(Some(1), &[(Sender::Prospect, "We run a staffing firm")]);
        assert_eq!(knowledge.campaigns.detect(&staffing), CampaignType::AgencyLeads);

        let silent = conversation(None, &[(Sender::Prospect, "ok")]);
        assert_eq!(knowledge.campaigns.detect(&silent), CampaignType::CazVid);
    }

    #[test]
    fn language_detection_counts_whole_words() {
        assert_eq!(detect_language("Hola, muchas gracias por todo"), Language::Es);
        assert_eq!(detect_language("Thanks, sounds good"), Language::En);
        // "pero" and "si" hidden inside English words must not count
        assert_eq!(detect_language("Perhaps the website is simple"), Language::En);
        assert_eq!(detect_language("¿Qué tal? Muy bien"), Language::Es);
    }

    #[test]
    fn energy_levels_follow_word_count_bands() {
        assert_eq!(EnergyLevel::from_word_count(3), EnergyLevel::Minimal);
        assert_eq!(EnergyLevel::from_word_count(10), EnergyLevel::Minimal);
        assert_eq!(EnergyLevel::from_word_count(11), EnergyLevel::Brief);
        assert_eq!(EnergyLevel::from_word_count(50), EnergyLevel::Engaged);
        assert_eq!(EnergyLevel::from_word_count(51), EnergyLevel::Detailed);
        assert_eq!(EnergyLevel::Minimal.max_reply_words(), Some(35));
        assert_eq!(EnergyLevel::Detailed.max_reply_words(), None);
    }

    #[test]
    fn sent_materials_only_look_at_our_messages() {
        let conv = conversation(
            None,
            &[
                (Sender::Us, "Post here: https://cazvid.com/es/vacantes/publicar"),
                (Sender::Us, "Tutorial https://youtu.be/mldU26l91ZA"),
                (Sender::Prospect, "is it $50?"),
            ],
        );

        let sent = SentMaterials::from_conversation(&conv);
        assert!(sent.job_link);
        assert!(sent.tutorial);
        assert!(!sent.pricing);
        assert!(!sent.calendly);
    }

    #[test]
    fn links_follow_language() {
        let knowledge = KnowledgeBase::default();
        assert!(knowledge.job_posting_link(Language::Es).contains("/es/"));
        assert!(knowledge.tutorial_link(Language::En).starts_with("https://youtu.be/"));
    }
}
