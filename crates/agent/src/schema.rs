use serde_json::{json, Value};

use crate::llm::JsonSchema;

pub const SCHEMA_NAME: &str = "outreach_response";

/// Structured output contract requested from every provider.
pub fn response_schema() -> JsonSchema {
    JsonSchema { name: SCHEMA_NAME, schema: schema_value() }
}

fn schema_value() -> Value {
    json!({
        "type": "object",
        "properties": {
            "analysis": {
                "type": "object",
                "properties": {
                    "intent": {
                        "type": "string",
                        "enum": [
                            "interest", "gratitude", "question", "objection",
                            "decline", "action_ready", "confusion", "information"
                        ]
                    },
                    "emotion": {
                        "type": "string",
                        "enum": [
                            "enthusiastic", "neutral", "skeptical", "frustrated",
                            "confused", "warm", "cold"
                        ]
                    },
                    "energy_level": {
                        "type": "string",
                        "enum": ["minimal", "brief", "engaged", "detailed"]
                    },
                    "deal_stage": {
                        "type": "string",
                        "enum": ["COLD", "ENGAGED", "QUALIFIED", "ACTION", "WON", "LOST"]
                    },
                    "language": { "type": "string", "enum": ["en", "es"] }
                },
                "required": ["intent", "emotion", "energy_level", "deal_stage", "language"],
                "additionalProperties": false
            },
            "action": {
                "type": "string",
                "enum": ["ENGAGE", "PROBE", "HOLD", "CLOSE", "ESCALATE"]
            },
            "reasoning": { "type": "string" },
            "message": { "type": ["string", "null"] },
            "confidence": { "type": "number" },
            "guardrail_check": {
                "type": "object",
                "properties": {
                    "no_false_free_claims": { "type": "boolean" },
                    "no_fabricated_features": { "type": "boolean" },
                    "appropriate_length": { "type": "boolean" },
                    "energy_matched": { "type": "boolean" },
                    "required_links_included": { "type": "boolean" }
                },
                "required": [
                    "no_false_free_claims", "no_fabricated_features", "appropriate_length",
                    "energy_matched", "required_links_included"
                ],
                "additionalProperties": false
            }
        },
        "required": ["analysis", "action", "reasoning", "message", "confidence", "guardrail_check"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::response_schema;

    #[test]
    fn every_property_is_required_for_strict_mode() {
        let schema = response_schema().schema;
        let properties = schema["properties"].as_object().expect("properties");
        let required = schema["required"].as_array().expect("required");

        assert_eq!(properties.len(), required.len());
        for name in required {
            assert!(properties.contains_key(name.as_str().expect("name")));
        }
    }
}
