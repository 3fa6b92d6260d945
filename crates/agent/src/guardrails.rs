//! Deterministic checks on drafted replies.
//!
//! Errors block sending outright. Warnings only keep a draft out of
//! auto-approval so a human looks at it first.

use std::collections::HashSet;

use outreach_core::domain::draft::ValidationReport;
use outreach_core::knowledge::{word_count, CampaignType, EnergyLevel};

const CONTACT_WORDS: [&str; 3] = ["contact", "contactar", "contacto"];
const FREE_WORDS: [&str; 3] = ["free", "gratis", "gratuito"];
const PRICE_PHRASES: [&str; 6] =
    ["$50", "50 usd", "subscription", "suscripción", "/month", "/mes"];
const UNIVERSAL_WORDS: [&str; 5] = ["all", "every", "each", "todos", "cada"];
const ADVANCING_PHRASES: [&str; 7] =
    ["post a job", "try it", "get started", "sign up", "book a demo", "publica", "agenda"];

pub const FREE_CONTACT_ERROR: &str = "Message implies contacting is free - must mention $50/month";
pub const ALL_VIDEOS_WARNING: &str =
    "Message may imply all candidates have videos - not always true";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationContext {
    pub campaign: CampaignType,
    pub prospect_word_count: usize,
}

pub fn validate_reply(message: &str, context: ValidationContext) -> ValidationReport {
    let lowered = message.to_lowercase();
    let words: HashSet<&str> =
        lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()).collect();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mentions_contact = CONTACT_WORDS.iter().any(|word| lowered.contains(word));
    let mentions_free = FREE_WORDS.iter().any(|word| lowered.contains(word));
    let mentions_price = PRICE_PHRASES.iter().any(|phrase| lowered.contains(phrase));
    if mentions_contact && mentions_free && !mentions_price {
        errors.push(FREE_CONTACT_ERROR.to_string());
    }

    if UNIVERSAL_WORDS.iter().any(|word| words.contains(word)) && lowered.contains("video") {
        warnings.push(ALL_VIDEOS_WARNING.to_string());
    }

    let advancing = ADVANCING_PHRASES.iter().any(|phrase| lowered.contains(phrase));
    let has_link =
        context.campaign.required_link_markers().iter().any(|marker| lowered.contains(marker));
    if advancing && !has_link {
        warnings.push(match context.campaign {
            CampaignType::CazVid => "Advancing message should include job posting link",
            CampaignType::AgencyLeads => "Advancing message should include Calendly link",
        }
        .to_string());
    }

    let energy = EnergyLevel::from_word_count(context.prospect_word_count);
    if let Some(budget) = energy.max_reply_words() {
        let reply_words = word_count(message);
        if reply_words > budget {
            let prospect_words = context.prospect_word_count;
            warnings.push(format!(
                "Reply has {reply_words} words, over the {budget}-word budget \
                 for a {prospect_words}-word message"
            ));
        }
    }

    ValidationReport { valid: errors.is_empty(), errors, warnings }
}

#[cfg(test)]
mod tests {
    use outreach_core::knowledge::CampaignType;

    use super::{validate_reply, ValidationContext, ALL_VIDEOS_WARNING, FREE_CONTACT_ERROR};

    fn cazvid(prospect_word_count: usize) -> ValidationContext {
        ValidationContext { campaign: CampaignType::CazVid, prospect_word_count }
    }

    #[test]
    fn free_contact_claim_is_an_error() {
        let report = validate_reply("You can contact candidates for free!", cazvid(5));
        assert!(!report.valid);
        assert_eq!(report.errors, vec![FREE_CONTACT_ERROR.to_string()]);

        let report = validate_reply("Contactar candidatos es gratis", cazvid(5));
        assert!(!report.valid);
    }

    #[test]
    fn price_phrase_qualifies_free_mention() {
        for message in [
            "Posting is free, to contact candidates it's $50/month",
            "Publicar es gratis y contactar cuesta 50 USD al mes",
            "Free to post, contacting needs a subscription",
            "Es gratuito publicar, el contacto es con suscripción",
        ] {
            let report = validate_reply(message, cazvid(40));
            assert!(report.valid, "{message}: {:?}", report.errors);
        }
    }

    #[test]
    fn universal_video_claim_warns() {
        let report = validate_reply("Every candidate has a video profile", cazvid(10));
        assert!(report.valid);
        assert_eq!(report.warnings, vec![ALL_VIDEOS_WARNING.to_string()]);

        let report = validate_reply("Many candidates record a video", cazvid(10));
        assert!(report.warnings.is_empty());

        let report = validate_reply("Happy to call about the video", cazvid(10));
        assert!(report.warnings.is_empty(), "`call` is not `all`");
    }

    #[test]
    fn advancing_without_campaign_link_warns() {
        let report = validate_reply("Want to post a job? It takes a minute", cazvid(10));
        assert_eq!(report.warnings, vec!["Advancing message should include job posting link"]);

        let report = validate_reply(
            "Want to post a job? https://cazvid.com/en/vacancies/post",
            cazvid(10),
        );
        assert!(report.warnings.is_empty());

        let agency =
            ValidationContext { campaign: CampaignType::AgencyLeads, prospect_word_count: 10 };
        let report = validate_reply("Happy to book a demo this week", agency);
        assert_eq!(report.warnings, vec!["Advancing message should include Calendly link"]);

        let report = validate_reply(
            "Book a demo here: https://calendly.com/jan-at-cazvid/agency-leads",
            agency,
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn reply_over_energy_budget_warns() {
        let long_reply = ["word"; 36].join(" ");
        let report = validate_reply(&long_reply, cazvid(3));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("35-word budget"));

        assert!(validate_reply(&long_reply, cazvid(20)).warnings.is_empty());
        assert!(validate_reply(&["word"; 400].join(" "), cazvid(80)).warnings.is_empty());
    }
}
