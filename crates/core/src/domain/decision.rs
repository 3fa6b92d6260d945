use serde::{Deserialize, Serialize};

/// What the model decided to do with a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Engage,
    Probe,
    Hold,
    Close,
    Escalate,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Engage => "engage",
            Self::Probe => "probe",
            Self::Hold => "hold",
            Self::Close => "close",
            Self::Escalate => "escalate",
        }
    }

    /// Case-insensitive; the model emits upper-case names.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ENGAGE" => Some(Self::Engage),
            "PROBE" => Some(Self::Probe),
            "HOLD" => Some(Self::Hold),
            "CLOSE" => Some(Self::Close),
            "ESCALATE" => Some(Self::Escalate),
            _ => None,
        }
    }

    pub fn auto_approvable(self) -> bool {
        matches!(self, Self::Engage | Self::Probe)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub intent: Option<String>,
    pub emotion: Option<String>,
    pub energy_level: Option<String>,
    pub deal_stage: Option<String>,
    pub language: Option<String>,
}

impl Analysis {
    pub fn emotion_is_any(&self, candidates: &[&str]) -> bool {
        self.emotion.as_deref().map(str::to_ascii_lowercase).is_some_and(|emotion| {
            candidates.iter().any(|candidate| emotion.contains(candidate))
        })
    }
}

/// The model's self-reported guardrail check. Absent fields are unknown, not failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailCheck {
    pub no_false_free_claims: Option<bool>,
    pub no_fabricated_features: Option<bool>,
    pub appropriate_length: Option<bool>,
    pub energy_matched: Option<bool>,
    pub required_links_included: Option<bool>,
}

impl GuardrailCheck {
    pub fn all_passed(&self) -> bool {
        [
            self.no_false_free_claims,
            self.no_fabricated_features,
            self.appropriate_length,
            self.energy_matched,
            self.required_links_included,
        ]
        .into_iter()
        .all(|value| value != Some(false))
    }
}

/// Parsed model output for one conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub action: Action,
    pub reasoning: String,
    pub message: Option<String>,
    pub confidence: f64,
    pub analysis: Analysis,
    pub guardrail_check: Option<GuardrailCheck>,
    pub parse_error: Option<String>,
    pub reviewed: bool,
    pub review_error: Option<String>,
    pub original_confidence: Option<f64>,
}

impl AgentDecision {
    /// Safe default used whenever the model output or the call itself is unusable.
    pub fn escalate(reasoning: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action: Action::Escalate,
            reasoning: reasoning.into(),
            message: None,
            confidence: 0.0,
            analysis: Analysis::default(),
            guardrail_check: None,
            parse_error: Some(error.into()),
            reviewed: false,
            review_error: None,
            original_confidence: None,
        }
    }

    /// True once the secondary review was attempted, whether or not it succeeded.
    pub fn routed_to_review(&self) -> bool {
        self.reviewed || self.review_error.is_some()
    }
}
