pub mod config;
pub mod doctor;
pub mod process;

use std::future::Future;

use serde::Serialize;

/// Exit codes shared by every command.
pub mod exit {
    pub const OK: u8 = 0;
    pub const CHECK_FAILED: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const SETUP: u8 = 3;
    pub const RUN_FAILED: u8 = 4;
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandFailure<'a> {
    command: &'a str,
    status: &'static str,
    error_class: &'a str,
    message: String,
}

impl CommandResult {
    /// Wraps a successful command's JSON payload.
    pub fn report(exit_code: u8, payload: &impl Serialize) -> Self {
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload =
            CommandFailure { command, status: "error", error_class, message: message.into() };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

/// Drives one async command body on a private runtime.
pub(crate) fn block_on<F: Future>(command: &str, future: F) -> Result<F::Output, CommandResult> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map(|runtime| runtime.block_on(future))
        .map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                exit::SETUP,
            )
        })
}

fn serialize_payload(payload: &impl Serialize) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
        serde_json::json!({
            "command": "unknown",
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
