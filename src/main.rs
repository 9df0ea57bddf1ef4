use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod conversation;
mod credentials;
mod dataset;
mod error;
mod lm_client;
mod lm_log;
mod prompt;
mod repl;
mod session;
mod templates;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.global.verbose);
    if let Err(err) = dotenv::dotenv() {
        tracing::debug!(error = %err, "no .env loaded");
    }

    match &args.command {
        Command::Programs(cmd) => workflow::run_programs(&args.global, cmd),
        Command::Prompt(cmd) => workflow::run_prompt(&args.global, cmd),
        Command::Forecast(cmd) => workflow::run_forecast(&args.global, cmd),
        Command::Session(cmd) => workflow::run_session(&args.global, cmd),
        Command::Init(cmd) => workflow::run_init(&args.global, cmd),
    }
}

/// Diagnostics on stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
