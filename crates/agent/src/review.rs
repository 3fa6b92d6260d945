use outreach_core::domain::decision::{Action, AgentDecision};

pub const REVIEW_CONFIDENCE_THRESHOLD: f64 = 0.70;

const PRICING_VOCABULARY: [&str; 6] = ["$", "free", "price", "cost", "gratis", "precio"];
const RISKY_EMOTIONS: [&str; 2] = ["frustrated", "skeptical"];

/// Why a primary draft is sent to the review model, if it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewTrigger {
    LowConfidence,
    Escalation,
    PricingLanguage,
    NegativeEmotion,
}

impl ReviewTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::Escalation => "escalation",
            Self::PricingLanguage => "pricing_language",
            Self::NegativeEmotion => "negative_emotion",
        }
    }
}

pub fn review_trigger(decision: &AgentDecision) -> Option<ReviewTrigger> {
    if decision.confidence < REVIEW_CONFIDENCE_THRESHOLD {
        return Some(ReviewTrigger::LowConfidence);
    }
    if decision.action == Action::Escalate {
        return Some(ReviewTrigger::Escalation);
    }

    let message = decision.message.as_deref().unwrap_or_default().to_lowercase();
    if PRICING_VOCABULARY.iter().any(|word| message.contains(word)) {
        return Some(ReviewTrigger::PricingLanguage);
    }
    if decision.analysis.emotion_is_any(&RISKY_EMOTIONS) {
        return Some(ReviewTrigger::NegativeEmotion);
    }

    None
}

pub fn needs_review(decision: &AgentDecision) -> bool {
    review_trigger(decision).is_some()
}

/// Marks `reviewed` as the replacement for `primary`.
pub fn adopt_review(primary: &AgentDecision, mut reviewed: AgentDecision) -> AgentDecision {
    reviewed.reviewed = true;
    reviewed.original_confidence = Some(primary.confidence);
    reviewed
}

/// Keeps the primary draft when the review call itself failed.
pub fn review_failed(mut primary: AgentDecision, error: impl Into<String>) -> AgentDecision {
    primary.review_error = Some(error.into());
    primary
}
