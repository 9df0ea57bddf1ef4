//! CLI argument parsing for the forecast workflow.
//!
//! Flags that shape the session (backend, credentials, Q&A, persona) are
//! global so every subcommand resolves them the same way.
use crate::credentials::CredentialSource;
use crate::prompt::{Persona, PromptLanguage};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "eduf",
    version,
    about = "Enrollment demand forecasts for academic programs, written by an LM",
    after_help = "Commands:\n  programs --data <csv>                         Validate a dataset and list its programs\n  prompt --data <csv> --program <name>          Print the analysis prompt without calling the LM\n  forecast --data <csv> --program <name>        Generate an analysis (add --ask for follow-ups)\n  session [--data <csv>]                        Interactive session with follow-up questions\n  init                                          Write a default eduf.json\n\nExamples:\n  eduf programs --data enrollment.csv\n  eduf forecast --data enrollment.csv --program CS --years 5 --trends \"AI demand\"\n  eduf forecast --data enrollment.csv --program CS --ask \"Why does 2027 dip?\"\n  eduf --lm \"llm -m gemini-2.0-flash\" session --data enrollment.csv",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to $EDUF_CONFIG, then ./eduf.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Local LM command that reads the prompt on stdin (overrides the config backend)
    #[arg(long, global = true, value_name = "CMD")]
    pub lm: Option<String>,

    /// API key for the HTTP backend (overrides secrets and prompting)
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Where the API key comes from
    #[arg(long, global = true, value_enum, value_name = "SOURCE")]
    pub credential_source: Option<CredentialSource>,

    /// Disable follow-up questions
    #[arg(long, global = true)]
    pub no_qa: bool,

    /// Persona framing for analysis prompts
    #[arg(long, global = true, value_enum)]
    pub persona: Option<Persona>,

    /// Language of the fixed prompt text
    #[arg(long, global = true, value_enum)]
    pub language: Option<PromptLanguage>,

    /// Directory for lm_log.jsonl
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Debug logging, plus full prompt/response files under --log-dir
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Programs(ProgramsArgs),
    Prompt(PromptArgs),
    Forecast(ForecastArgs),
    Session(SessionArgs),
    Init(InitArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Validate a dataset and list its programs")]
pub struct ProgramsArgs {
    /// CSV with a `programa` column
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Inputs shared by every command that renders an analysis prompt.
#[derive(Args, Debug, Clone)]
pub struct ProjectionArgs {
    /// CSV with a `programa` column
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Program to project (a value of the `programa` column)
    #[arg(long, value_name = "NAME")]
    pub program: String,

    /// Years to project; clamped to 1..=20 (default from config, normally 5)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub years: Option<i64>,

    /// External trends to consider, as free text
    #[arg(long, value_name = "TEXT", conflicts_with = "trends_file")]
    pub trends: Option<String>,

    /// Read the trends text from a file
    #[arg(long, value_name = "PATH")]
    pub trends_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Print the analysis prompt without calling the LM")]
pub struct PromptArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Generate an analysis and answer follow-up questions")]
pub struct ForecastArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,

    /// Follow-up question, asked after the analysis (repeatable, in order)
    #[arg(long, value_name = "QUESTION")]
    pub ask: Vec<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Interactive session: load data, generate, ask follow-ups")]
pub struct SessionArgs {
    /// CSV to load at start
    #[arg(long, value_name = "CSV")]
    pub data: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default config file")]
pub struct InitArgs {
    /// Where to write the config (defaults to --config, then ./eduf.json)
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn parses_forecast_with_global_flags_after_subcommand() {
        let args = RootArgs::try_parse_from([
            "eduf",
            "forecast",
            "--data",
            "data.csv",
            "--program",
            "CS",
            "--years",
            "-3",
            "--ask",
            "Q1",
            "--ask",
            "Q2",
            "--no-qa",
            "--credential-source",
            "prompt",
            "--language",
            "es",
        ])
        .expect("parse");
        assert!(args.global.no_qa);
        assert_eq!(args.global.credential_source, Some(CredentialSource::Prompt));
        assert_eq!(args.global.language, Some(PromptLanguage::Es));
        let Command::Forecast(forecast) = args.command else {
            panic!("expected forecast command");
        };
        assert_eq!(forecast.projection.years, Some(-3));
        assert_eq!(forecast.ask, vec!["Q1", "Q2"]);
    }

    #[test]
    fn trends_sources_conflict() {
        let err = RootArgs::try_parse_from([
            "eduf",
            "prompt",
            "--data",
            "d.csv",
            "--program",
            "CS",
            "--trends",
            "x",
            "--trends-file",
            "t.txt",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
