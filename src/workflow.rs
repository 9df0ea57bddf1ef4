//! Command handlers.
//!
//! Each handler resolves a `ForecastContext`, builds the session it needs,
//! and prints user-facing results on stdout. Diagnostics go to stderr.
use crate::cli::{
    ForecastArgs, GlobalArgs, InitArgs, ProgramsArgs, ProjectionArgs, PromptArgs, SessionArgs,
};
use crate::config;
use crate::conversation::QaEntry;
use crate::dataset::{Dataset, ROW_LIMIT};
use crate::repl::{self, Selection};
use crate::session::{ProjectionRequest, Session};
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod context;

use context::ForecastContext;

#[derive(Debug, Serialize)]
struct ProgramsReport {
    data: String,
    rows: usize,
    programs: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ForecastReport<'a> {
    program: &'a str,
    horizon: u8,
    analysis: &'a str,
    followups: &'a [QaEntry],
}

pub fn run_programs(global: &GlobalArgs, args: &ProgramsArgs) -> Result<()> {
    let ctx = ForecastContext::load(global)?;
    let mut session = ctx.offline_session();
    let dataset = read_dataset(&args.data)?;
    let rows = dataset.len();
    if dataset.is_empty() {
        eprintln!("warning: {} has a header but no rows", args.data.display());
    }
    let preview = dataset.preview(ROW_LIMIT);
    let programs = session.load_dataset(dataset)?.to_vec();

    if args.json {
        let report = ProgramsReport {
            data: args.data.display().to_string(),
            rows,
            programs,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize programs report")?
        );
        return Ok(());
    }

    println!("Loaded {rows} rows from {}", args.data.display());
    println!();
    println!("{preview}");
    println!();
    println!("Programs ({}):", programs.len());
    for program in &programs {
        println!("  {program}");
    }
    Ok(())
}

pub fn run_prompt(global: &GlobalArgs, args: &PromptArgs) -> Result<()> {
    let ctx = ForecastContext::load(global)?;
    let mut session = ctx.offline_session();
    let request = load_projection(&ctx, &mut session, &args.projection)?;
    print!("{}", session.analysis_prompt(&request)?);
    Ok(())
}

pub fn run_forecast(global: &GlobalArgs, args: &ForecastArgs) -> Result<()> {
    let ctx = ForecastContext::load(global)?;
    if !args.ask.is_empty() && !ctx.config.qa_enabled {
        return Err(anyhow!("--ask given but follow-up questions are disabled"));
    }
    let mut session = ctx.session()?;
    let request = load_projection(&ctx, &mut session, &args.projection)?;

    let analysis = session
        .generate_analysis(&request)
        .with_context(|| format!("generate analysis for {}", request.program))?
        .to_string();
    if !args.json {
        println!("{analysis}");
    }
    // A failed follow-up still prints the report with the answers so far.
    let mut failure = None;
    for question in &args.ask {
        match session.ask(question) {
            Ok(entry) => {
                if !args.json {
                    println!();
                    println!("Q: {}", entry.question);
                    println!("A: {}", entry.answer);
                }
            }
            Err(err) => {
                failure = Some(anyhow::Error::from(err).context(format!("ask {question:?}")));
                break;
            }
        }
    }

    if args.json {
        let report = ForecastReport {
            program: &request.program,
            horizon: request.horizon.years(),
            analysis: &analysis,
            followups: session.conversation().history(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize forecast report")?
        );
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

pub fn run_session(global: &GlobalArgs, args: &SessionArgs) -> Result<()> {
    let ctx = ForecastContext::load(global)?;
    let mut session = ctx.session()?;
    let mut selection = Selection::new(ctx.horizon(None));
    if let Some(path) = &ctx.config_path {
        let cwd = std::env::current_dir().ok();
        eprintln!("config: {}", display_path(path, cwd.as_deref()));
    }
    if let Some(path) = &args.data {
        let dataset = read_dataset(path)?;
        session.load_dataset(dataset)?;
        selection.reset_program(session.programs());
        if let Some(dataset) = session.dataset() {
            println!("{}", dataset.preview(ROW_LIMIT));
        }
        println!(
            "Loaded {} programs from {}",
            session.programs().len(),
            path.display()
        );
    }
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    repl::run(&mut session, &mut selection, stdin.lock(), &mut stdout)
}

pub fn run_init(global: &GlobalArgs, args: &InitArgs) -> Result<()> {
    let path = args
        .path
        .clone()
        .or_else(|| global.config.clone())
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));
    if path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    config::write_config(&path, &config::default_config())?;
    println!("wrote {}", path.display());
    Ok(())
}

pub(crate) fn read_dataset(path: &Path) -> Result<Dataset> {
    Dataset::from_csv_path(path).with_context(|| format!("load dataset {}", path.display()))
}

fn load_projection(
    ctx: &ForecastContext,
    session: &mut Session,
    args: &ProjectionArgs,
) -> Result<ProjectionRequest> {
    let dataset = read_dataset(&args.data)?;
    session.load_dataset(dataset)?;
    let trends = match (&args.trends, &args.trends_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("read trends file {}", path.display()))?,
        (None, None) => String::new(),
    };
    Ok(ProjectionRequest::new(
        args.program.clone(),
        ctx.horizon(args.years),
        trends,
    ))
}
