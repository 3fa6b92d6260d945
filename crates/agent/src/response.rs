//! Model output parsing and message clean-up.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use outreach_core::domain::decision::{Action, AgentDecision, Analysis, GuardrailCheck};

pub const PARSE_FAILURE_REASONING: &str = "Failed to parse AI response";
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Parses raw model text into a decision. Never fails: unusable output becomes an escalation.
pub fn parse_decision(raw: &str) -> AgentDecision {
    match extract_object(raw) {
        Ok(object) => decision_from_value(&object),
        Err(error) => AgentDecision::escalate(PARSE_FAILURE_REASONING, error),
    }
}

/// Raw JSON first, then the outermost `{...}` span (fenced or chatty output).
fn extract_object(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    let parsed = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(direct_error) => {
            let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
                return Err(format!("no JSON object in response: {direct_error}"));
            };
            if end < start {
                return Err("no JSON object in response".to_string());
            }
            serde_json::from_str::<Value>(&trimmed[start..=end])
                .map_err(|error| format!("invalid JSON in response: {error}"))?
        }
    };

    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err("response JSON is not an object".to_string())
    }
}

fn decision_from_value(value: &Value) -> AgentDecision {
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .and_then(Action::parse)
        .unwrap_or(Action::Escalate);
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|confidence| confidence.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(post_process)
        .filter(|message| !message.is_empty());
    let analysis = value
        .get("analysis")
        .cloned()
        .and_then(|analysis| serde_json::from_value::<Analysis>(analysis).ok())
        .unwrap_or_default();
    let guardrail_check = value
        .get("guardrail_check")
        .filter(|check| check.is_object())
        .cloned()
        .and_then(|check| serde_json::from_value::<GuardrailCheck>(check).ok());

    AgentDecision {
        action,
        reasoning: value.get("reasoning").and_then(Value::as_str).unwrap_or_default().to_string(),
        message,
        confidence,
        analysis,
        guardrail_check,
        parse_error: None,
        reviewed: false,
        review_error: None,
        original_confidence: None,
    }
}

const PLACEHOLDER_PATTERN: &str = r"(?i)\[first ?name\]|\[name\]|\{\{.*?\}\}";
const ORPHAN_GREETING_PATTERN: &str = r"(?i)^(hi|hola|hello|hey)\s*,\s*";

fn compiled(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

/// Fixes formatting the prompt forbids but models still produce.
pub fn post_process(message: &str) -> String {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    static ORPHAN_GREETING: OnceLock<Option<Regex>> = OnceLock::new();

    let mut text = message.replace('\u{2014}', " - ").replace('\u{2013}', "-");
    if let Some(pattern) = compiled(&PLACEHOLDER, PLACEHOLDER_PATTERN) {
        text = pattern.replace_all(&text, "").into_owned();
    }

    text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(pattern) = compiled(&ORPHAN_GREETING, ORPHAN_GREETING_PATTERN) {
        text = pattern.replace(&text, "${1}! ").into_owned();
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use outreach_core::domain::decision::Action;

    use super::{parse_decision, post_process, PARSE_FAILURE_REASONING};

    #[test]
    fn parses_raw_json() {
        let decision = parse_decision(
            r#"{"action":"ENGAGE","reasoning":"interested","message":"Hi Ana! Want the link?",
                "confidence":0.92,"analysis":{"intent":"interest","emotion":"warm",
                "energy_level":"minimal","deal_stage":"ENGAGED","language":"en"},
                "guardrail_check":{"no_false_free_claims":true,"no_fabricated_features":true,
                "appropriate_length":true,"energy_matched":true,"required_links_included":true}}"#,
        );

        assert_eq!(decision.action, Action::Engage);
        assert_eq!(decision.confidence, 0.92);
        assert_eq!(decision.message.as_deref(), Some("Hi Ana! Want the link?"));
        assert_eq!(decision.analysis.emotion.as_deref(), Some("warm"));
        assert!(decision.guardrail_check.expect("check").all_passed());
        assert!(decision.parse_error.is_none());
    }

    #[test]
    fn extracts_json_from_markdown_fence() {
        let decision = parse_decision(
            "Here you go:\n```json\n{\"action\": \"probe\", \"message\": \"What role?\"}\n```",
        );

        assert_eq!(decision.action, Action::Probe);
        assert_eq!(decision.confidence, 0.5);
        assert_eq!(decision.message.as_deref(), Some("What role?"));
    }

    #[test]
    fn unparseable_output_escalates_with_zero_confidence() {
        for raw in ["", "I think you should engage", "{not json}", "[1, 2, 3]"] {
            let decision = parse_decision(raw);
            assert_eq!(decision.action, Action::Escalate, "input: {raw}");
            assert_eq!(decision.confidence, 0.0);
            assert_eq!(decision.reasoning, PARSE_FAILURE_REASONING);
            assert!(decision.parse_error.is_some());
        }
    }

    #[test]
    fn missing_or_unknown_action_escalates_and_confidence_is_clamped() {
        let decision = parse_decision(r#"{"message": "hello", "confidence": 1.7}"#);
        assert_eq!(decision.action, Action::Escalate);
        assert_eq!(decision.confidence, 1.0);

        let decision = parse_decision(r#"{"action": "REPLY", "confidence": -2}"#);
        assert_eq!(decision.action, Action::Escalate);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn null_message_is_absent() {
        let decision = parse_decision(r#"{"action": "HOLD", "message": null, "confidence": 0.8}"#);
        assert_eq!(decision.action, Action::Hold);
        assert!(decision.message.is_none());
    }

    #[test]
    fn post_process_removes_dashes_and_placeholders() {
        assert_eq!(
            post_process("Great question \u{2014} posting is free"),
            "Great question - posting is free"
        );
        assert_eq!(post_process("Range 10\u{2013}20"), "Range 10-20");
        assert_eq!(post_process("Hi [Name], thanks!"), "Hi! thanks!");
        assert_eq!(post_process("Hola {{firstName}}, ¿qué tal?"), "Hola! ¿qué tal?");
        assert_eq!(post_process("Hey [First Name],   see   you"), "Hey! see you");
        assert_eq!(post_process("  Thanks Ana  "), "Thanks Ana");
    }
}
