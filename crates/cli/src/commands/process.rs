use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use outreach_agent::{
    client_from_config, AgentRuntime, Drafter, DrafterSettings, PromptBuilder, RunOptions,
    RuntimeSettings,
};
use outreach_core::config::{AppConfig, LoadOptions, LogFormat};
use outreach_core::domain::run::{Run, RunErrorEntry, RunId, RunMode, RunSummary};
use outreach_core::knowledge::KnowledgeBase;
use outreach_db::Store;
use outreach_heyreach::HeyReachClient;

use crate::commands::{block_on, exit, CommandResult};

const LIVE_RUN_PAUSE: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessArgs {
    pub dry_run: bool,
    pub max_messages: Option<u32>,
    pub yes: bool,
}

impl ProcessArgs {
    pub fn options(&self) -> RunOptions {
        let mode = if self.dry_run { RunMode::DryRun } else { RunMode::Live };
        RunOptions { mode, max_messages: self.max_messages }
    }

    fn pause(&self) -> Duration {
        if self.dry_run || self.yes {
            Duration::ZERO
        } else {
            LIVE_RUN_PAUSE
        }
    }
}

#[derive(Debug, Serialize)]
struct ProcessReport {
    command: &'static str,
    status: &'static str,
    run_id: RunId,
    mode: RunMode,
    send_enabled: bool,
    duration_ms: i64,
    summary: RunSummary,
    errors: Vec<RunErrorEntry>,
}

pub fn run(args: ProcessArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "process",
                "config_validation",
                format!("configuration issue: {error}"),
                exit::CONFIG,
            );
        }
    };
    init_logging(&config);

    let runtime = match build_runtime(&config) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match block_on("process", execute(&runtime, args)) {
        Ok(result) | Err(result) => result,
    }
}

/// Wires the runtime the same way the server does, minus the HTTP surface.
fn build_runtime(config: &AppConfig) -> Result<AgentRuntime, CommandResult> {
    let setup_failure = |class: &str, message: String| {
        CommandResult::failure("process", class, message, exit::SETUP)
    };

    let crm = HeyReachClient::from_config(&config.heyreach)
        .map_err(|error| setup_failure("crm_setup", error.to_string()))?;
    let llm = client_from_config(&config.llm)
        .map_err(|error| setup_failure("llm_setup", error.to_string()))?;
    let prompts = PromptBuilder::new(KnowledgeBase::from_config(config))
        .map_err(|error| setup_failure("prompt_templates", error.to_string()))?;

    Ok(AgentRuntime::new(
        Arc::new(crm),
        Drafter::new(llm, prompts, DrafterSettings::from_config(&config.llm)),
        Store::in_memory(),
        RuntimeSettings::from_config(config),
    ))
}

/// Runs once and renders the outcome. A live run pauses first unless confirmed.
pub async fn execute(runtime: &AgentRuntime, args: ProcessArgs) -> CommandResult {
    let pause = args.pause();
    if !pause.is_zero() {
        eprintln!(
            "LIVE run: approved replies will be sent. Starting in {}s \
             (Ctrl-C to abort, --yes to skip)",
            pause.as_secs()
        );
        tokio::time::sleep(pause).await;
    }

    match runtime.process(args.options()).await {
        Ok(run) => render(&run, runtime.settings().send_enabled),
        Err(error) => {
            CommandResult::failure("process", "run_rejected", error.to_string(), exit::RUN_FAILED)
        }
    }
}

fn render(run: &Run, send_enabled: bool) -> CommandResult {
    let fatal = run.has_fatal_error();
    let report = ProcessReport {
        command: "process",
        status: if fatal { "error" } else { "ok" },
        run_id: run.id.clone(),
        mode: run.mode,
        send_enabled,
        duration_ms: run.duration_ms,
        summary: run.summary.clone(),
        errors: run.errors.clone(),
    };

    CommandResult::report(if fatal { exit::RUN_FAILED } else { exit::OK }, &report)
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);

    // A second init in the same process is ignored.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
