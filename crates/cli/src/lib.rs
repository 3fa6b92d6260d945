pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "outreach",
    about = "Outreach operator CLI",
    long_about = "Run the LinkedIn reply agent, check readiness, and inspect configuration.",
    after_help = "Examples:\n  outreach process --dry-run\n  outreach process --max 10 --yes\n  \
                  outreach doctor --json\n  outreach config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Fetch unseen conversations, draft replies, and send or queue them")]
    Process {
        #[arg(long, help = "Draft only; never send anything")]
        dry_run: bool,
        #[arg(long = "max", value_name = "N", help = "Stop after N messages have been sent")]
        max_messages: Option<u32>,
        #[arg(long, help = "Skip the pause before a live run")]
        yes: bool,
    },
    #[command(
        visible_alias = "health",
        about = "Validate config, HeyReach key, and model provider readiness"
    )]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Process { dry_run, max_messages, yes } => {
            commands::process::run(commands::process::ProcessArgs { dry_run, max_messages, yes })
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
