use outreach_core::config::{AppConfig, LlmProvider, LoadOptions};
use outreach_heyreach::{CrmClient, HeyReachClient, RetryPolicy};
use serde::Serialize;

use crate::commands::{block_on, exit, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code =
        if report.overall_status == CheckStatus::Pass { exit::OK } else { exit::CHECK_FAILED };

    if json_output {
        return CommandResult::report(exit_code, &report);
    }
    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_provider(&config));
            checks.push(check_heyreach_key(&config));
            checks.push(check_send_mode(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_provider", "heyreach_api_key", "send_mode"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { command: "doctor", overall_status, summary, checks }
}

fn check_llm_provider(config: &AppConfig) -> DoctorCheck {
    let provider = config.llm.resolved_provider();
    let details = match provider {
        LlmProvider::OpenAi => {
            let retrieval = match config.llm.vector_store_id.as_deref() {
                Some(id) => format!("file_search on `{id}`"),
                None => "no retrieval".to_string(),
            };
            format!(
                "openai: primary `{}`, review `{}`, {retrieval}",
                config.llm.primary_model, config.llm.review_model
            )
        }
        LlmProvider::Anthropic => format!("anthropic: model `{}`", config.llm.anthropic_model),
    };

    DoctorCheck { name: "llm_provider", status: CheckStatus::Pass, details }
}

/// One quick call against the key check endpoint, without the backoff schedule.
fn check_heyreach_key(config: &AppConfig) -> DoctorCheck {
    let client = match HeyReachClient::from_config(&config.heyreach) {
        Ok(client) => client.with_retry_policy(RetryPolicy::immediate()),
        Err(error) => {
            return DoctorCheck {
                name: "heyreach_api_key",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let result = match block_on("doctor", async { client.check_api_key().await }) {
        Ok(result) => result.map_err(|error| error.to_string()),
        Err(failure) => Err(failure.output),
    };

    match result {
        Ok(()) => DoctorCheck {
            name: "heyreach_api_key",
            status: CheckStatus::Pass,
            details: format!("key accepted by {}", config.heyreach.base_url),
        },
        Err(details) => {
            DoctorCheck { name: "heyreach_api_key", status: CheckStatus::Fail, details }
        }
    }
}

fn check_send_mode(config: &AppConfig) -> DoctorCheck {
    let details = if config.processing.send_enabled {
        format!(
            "sending enabled; auto-approve at confidence >= {:.2}, at most {} sends per run",
            config.processing.auto_approve_confidence, config.processing.max_messages_per_run
        )
    } else {
        "sending disabled; runs only queue drafts for approval".to_string()
    };

    DoctorCheck { name: "send_mode", status: CheckStatus::Pass, details }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
