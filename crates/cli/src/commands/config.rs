use std::env;
use std::fs;
use std::path::Path;

use outreach_core::config::{detect_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use crate::commands::{exit, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigField {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    config_file: Option<String>,
    fields: Vec<ConfigField>,
}

struct Sources {
    file_doc: Option<Value>,
    file_label: Option<String>,
}

impl Sources {
    fn detect() -> Self {
        let path = detect_config_path();
        let file_doc = load_config_file_doc(path.as_deref());
        Self { file_doc, file_label: path.map(|path| path.display().to_string()) }
    }

    fn field(&self, key: &'static str, value: String, env_keys: &[&str]) -> ConfigField {
        ConfigField { key, value, source: self.source_of(key, env_keys) }
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let label = self.file_label.as_deref().unwrap_or("config file");
                return format!("file ({label})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                exit::CONFIG,
            );
        }
    };

    let sources = Sources::detect();
    let report = ConfigReport {
        command: "config",
        status: "ok",
        precedence: "overrides > env > file > default",
        config_file: sources.file_label.clone(),
        fields: fields(&config, &sources),
    };
    CommandResult::report(exit::OK, &report)
}

fn fields(config: &AppConfig, sources: &Sources) -> Vec<ConfigField> {
    let heyreach = &config.heyreach;
    let llm = &config.llm;
    let processing = &config.processing;

    vec![
        sources.field(
            "environment",
            config.environment.clone(),
            &["OUTREACH_ENVIRONMENT", "NODE_ENV"],
        ),
        sources.field(
            "heyreach.api_key",
            redact_secret(Some(&heyreach.api_key)),
            &["OUTREACH_HEYREACH_API_KEY", "HEYREACH_API_KEY"],
        ),
        sources.field(
            "heyreach.base_url",
            heyreach.base_url.clone(),
            &["OUTREACH_HEYREACH_BASE_URL"],
        ),
        sources.field(
            "heyreach.account_ids",
            join_ids(&heyreach.account_ids),
            &["OUTREACH_ACCOUNT_IDS"],
        ),
        sources.field(
            "heyreach.campaign_ids",
            join_ids(&heyreach.campaign_ids),
            &["OUTREACH_CAMPAIGN_IDS"],
        ),
        sources.field(
            "heyreach.fetch_limit",
            heyreach.fetch_limit.to_string(),
            &["OUTREACH_FETCH_LIMIT", "FETCH_LIMIT"],
        ),
        sources.field(
            "llm.provider",
            format!("{:?}", llm.resolved_provider()),
            &["OUTREACH_LLM_PROVIDER"],
        ),
        sources.field(
            "llm.openai_api_key",
            redact_secret(llm.openai_api_key.as_ref()),
            &["OUTREACH_OPENAI_API_KEY", "OPENAI_API_KEY"],
        ),
        sources.field(
            "llm.anthropic_api_key",
            redact_secret(llm.anthropic_api_key.as_ref()),
            &["OUTREACH_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"],
        ),
        sources.field(
            "llm.primary_model",
            llm.primary_model.clone(),
            &["OUTREACH_PRIMARY_MODEL", "OPENAI_PRIMARY_MODEL"],
        ),
        sources.field(
            "llm.review_model",
            llm.review_model.clone(),
            &["OUTREACH_REVIEW_MODEL", "OPENAI_REVIEW_MODEL"],
        ),
        sources.field(
            "llm.anthropic_model",
            llm.anthropic_model.clone(),
            &["OUTREACH_ANTHROPIC_MODEL", "CLAUDE_MODEL"],
        ),
        sources.field(
            "llm.vector_store_id",
            llm.vector_store_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["OUTREACH_VECTOR_STORE_ID", "OPENAI_VECTOR_STORE_ID"],
        ),
        sources.field(
            "llm.openai_max_output_tokens",
            llm.openai_max_output_tokens
                .map_or_else(|| "<unset>".to_string(), |cap| cap.to_string()),
            &["OUTREACH_OPENAI_MAX_OUTPUT_TOKENS"],
        ),
        sources.field(
            "llm.review_enabled",
            llm.review_enabled.to_string(),
            &["OUTREACH_REVIEW_ENABLED"],
        ),
        sources.field(
            "processing.send_enabled",
            processing.send_enabled.to_string(),
            &["OUTREACH_SEND_ENABLED", "SEND_ENABLED"],
        ),
        sources.field(
            "processing.auto_approve_confidence",
            processing.auto_approve_confidence.to_string(),
            &["OUTREACH_AUTO_APPROVE_CONFIDENCE", "AUTO_APPROVE_CONFIDENCE"],
        ),
        sources.field(
            "processing.max_messages_per_run",
            processing.max_messages_per_run.to_string(),
            &["OUTREACH_MAX_MESSAGES_PER_RUN", "MAX_MESSAGES_PER_RUN"],
        ),
        sources.field(
            "processing.escalation_tag",
            processing.escalation_tag.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["OUTREACH_ESCALATION_TAG"],
        ),
        sources.field(
            "dashboard.password",
            redact_secret(config.dashboard.password.as_ref()),
            &["OUTREACH_DASHBOARD_PASSWORD", "DASHBOARD_PASSWORD"],
        ),
        sources.field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["OUTREACH_SERVER_BIND_ADDRESS"],
        ),
        sources.field(
            "server.port",
            config.server.port.to_string(),
            &["OUTREACH_SERVER_PORT", "PORT"],
        ),
        sources.field(
            "logging.level",
            config.logging.level.clone(),
            &["OUTREACH_LOGGING_LEVEL", "OUTREACH_LOG_LEVEL"],
        ),
        sources.field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["OUTREACH_LOGGING_FORMAT", "OUTREACH_LOG_FORMAT"],
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// Keeps a short prefix so operators can tell keys apart.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((prefix, _)) = trimmed.split_once('-') {
        if prefix.len() <= 4 {
            return format!("{prefix}-***");
        }
    }
    "<redacted>".to_string()
}
