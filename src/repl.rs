//! Line-oriented interactive session.
//!
//! Stands in for the form controls: choose a program, a horizon and trends,
//! generate, then ask follow-ups. Errors are reported and the loop keeps
//! going with state unchanged.
use crate::dataset::ROW_LIMIT;
use crate::prompt::{Horizon, MAX_HORIZON, MIN_HORIZON};
use crate::session::{ProjectionRequest, Session};
use crate::workflow::read_dataset;
use anyhow::{anyhow, Result};
use std::io::{BufRead, Write};
use std::path::Path;

const HELP: &str = "\
Commands:
  load <csv>          Load a dataset (replaces the current one)
  programs            List programs in the dataset
  program <name>      Select the program to project
  years <n>           Years to project (clamped to 1-20)
  trends <text>       External trends to consider (empty clears)
  generate            Generate a new analysis (clears previous questions)
  ask <question>      Ask a follow-up question about the current analysis
  history             Show questions asked about the current analysis
  show                Show the current selection and analysis
  help                Show this help
  quit                Leave the session";

/// Current form values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub program: Option<String>,
    pub horizon: Horizon,
    pub trends: String,
}

impl Selection {
    pub fn new(horizon: Horizon) -> Self {
        Self {
            program: None,
            horizon,
            trends: String::new(),
        }
    }

    /// Keep the selected program if it still exists, else pick the first.
    pub fn reset_program(&mut self, programs: &[String]) {
        let keep = self
            .program
            .as_ref()
            .is_some_and(|current| programs.contains(current));
        if !keep {
            self.program = programs.first().cloned();
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

pub fn run<R: BufRead, W: Write>(
    session: &mut Session,
    selection: &mut Selection,
    input: R,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "Type `help` for commands.")?;
    if !session.can_generate() {
        writeln!(out, "Generation is disabled: no usable LM backend or API key.")?;
    }
    if !session.qa_enabled() {
        writeln!(out, "Follow-up questions are disabled.")?;
    }
    let mut lines = input.lines();
    loop {
        write!(out, "eduf> ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;
        match dispatch(session, selection, line.trim(), out) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => writeln!(out, "error: {err:#}")?,
        }
    }
    Ok(())
}

fn dispatch<W: Write>(
    session: &mut Session,
    selection: &mut Selection,
    line: &str,
    out: &mut W,
) -> Result<Flow> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "" => {}
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" => writeln!(out, "{HELP}")?,
        "load" => {
            if rest.is_empty() {
                return Err(anyhow!("usage: load <csv>"));
            }
            let dataset = read_dataset(Path::new(rest))?;
            let count = session.load_dataset(dataset)?.len();
            selection.reset_program(session.programs());
            if let Some(dataset) = session.dataset() {
                writeln!(out, "{}", dataset.preview(ROW_LIMIT))?;
            }
            writeln!(out, "Loaded {count} programs from {rest}")?;
            write_programs(session, selection, out)?;
        }
        "programs" => {
            if session.dataset().is_none() {
                return Err(anyhow!("no dataset loaded (use `load <csv>`)"));
            }
            write_programs(session, selection, out)?;
        }
        "program" => {
            if !session.programs().iter().any(|program| program == rest) {
                return Err(anyhow!("unknown program {rest:?} (see `programs`)"));
            }
            selection.program = Some(rest.to_string());
            writeln!(out, "program: {rest}")?;
        }
        "years" => {
            let years: i64 = rest.parse().map_err(|_| {
                anyhow!("years must be a whole number between {MIN_HORIZON} and {MAX_HORIZON}")
            })?;
            selection.horizon = Horizon::clamped(years);
            writeln!(out, "years: {}", selection.horizon)?;
        }
        "trends" => {
            selection.trends = rest.to_string();
            if rest.is_empty() {
                writeln!(out, "trends cleared")?;
            } else {
                writeln!(out, "trends set")?;
            }
        }
        "generate" => {
            let program = selection
                .program
                .clone()
                .ok_or_else(|| anyhow!("no program selected (use `load` then `program`)"))?;
            let request =
                ProjectionRequest::new(program, selection.horizon, selection.trends.clone());
            let analysis = session.generate_analysis(&request)?;
            writeln!(out, "{analysis}")?;
        }
        "ask" => {
            let entry = session.ask(rest)?;
            writeln!(out, "{}", entry.answer)?;
        }
        "history" => {
            let conversation = session.conversation();
            if conversation.is_empty() {
                return Err(anyhow!("no analysis yet (use `generate`)"));
            }
            if conversation.history().is_empty() {
                writeln!(out, "no questions yet")?;
            }
            for (idx, entry) in conversation.history().iter().enumerate() {
                writeln!(out, "{}. Q: {}", idx + 1, entry.question)?;
                writeln!(out, "   A: {}", entry.answer)?;
            }
        }
        "show" => {
            writeln!(
                out,
                "program: {}",
                selection.program.as_deref().unwrap_or("<none>")
            )?;
            writeln!(out, "years: {}", selection.horizon)?;
            let trends = if selection.trends.is_empty() {
                "<none>"
            } else {
                selection.trends.as_str()
            };
            writeln!(out, "trends: {trends}")?;
            match session.conversation().analysis() {
                Some(analysis) => writeln!(out, "analysis:\n{analysis}")?,
                None => writeln!(out, "analysis: <none>")?,
            }
        }
        other => return Err(anyhow!("unknown command {other:?} (try `help`)")),
    }
    Ok(Flow::Continue)
}

fn write_programs<W: Write>(session: &Session, selection: &Selection, out: &mut W) -> Result<()> {
    for program in session.programs() {
        let marker = if selection.program.as_deref() == Some(program.as_str()) {
            "*"
        } else {
            " "
        };
        writeln!(out, "{marker} {program}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::lm_client::TextGenerator;
    use crate::prompt::PromptOptions;
    use std::cell::Cell;

    /// Generator that numbers its replies.
    struct Counter {
        calls: Cell<u32>,
    }

    impl TextGenerator for Counter {
        fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            let kind = if prompt.contains("The user now asks") {
                "answer"
            } else {
                "analysis"
            };
            Ok(format!("{kind} {call}"))
        }

        fn describe(&self) -> String {
            "counter".to_string()
        }
    }

    fn run_script(script: &str, csv: &str) -> String {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("data.csv");
        std::fs::write(&data, csv).expect("write csv");
        let script = script.replace("{data}", &data.display().to_string());

        let mut session = Session::new(PromptOptions::default(), true)
            .with_generator(Box::new(Counter { calls: Cell::new(0) }));
        let mut selection = Selection::new(Horizon::default());
        let mut out = Vec::new();
        run(&mut session, &mut selection, script.as_bytes(), &mut out).expect("run repl");
        String::from_utf8(out).expect("utf8 output")
    }

    const CSV: &str = "programa,anio,demanda\nCS,2020,100\nMath,2020,40\n";

    #[test]
    fn full_session_flow() {
        let out = run_script(
            "load {data}\nprogram Math\nyears 30\ntrends AI growth\ngenerate\nask why?\nhistory\ngenerate\nhistory\nquit\n",
            CSV,
        );
        let preview = out.find("programa  anio  demanda").expect("dataset preview");
        assert!(out.contains("CS        2020      100"));
        let loaded = out.find("Loaded 2 programs").expect("load summary");
        let listed = out.find("* CS").expect("program list");
        assert!(preview < loaded && loaded < listed);
        assert!(out.contains("program: Math"));
        assert!(out.contains("years: 20"));
        assert!(out.contains("analysis 1"));
        assert!(out.contains("answer 2"));
        assert!(out.contains("1. Q: why?"));
        assert!(out.contains("analysis 3"));
        assert!(out.contains("no questions yet"));
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let out = run_script("ask early?\nprogram Nope\nbogus\nload {data}\nshow\n", CSV);
        assert!(out.contains("error: precondition failed: no analysis to question"));
        assert!(out.contains("error: unknown program \"Nope\""));
        assert!(out.contains("error: unknown command \"bogus\""));
        assert!(out.contains("program: CS"));
        assert!(out.contains("analysis: <none>"));
    }

    #[test]
    fn invalid_dataset_is_reported() {
        let out = run_script("load {data}\nprograms\n", "program,anio\nCS,2020\n");
        assert!(out.contains("missing category column 'programa'"));
        assert!(out.contains("error: no dataset loaded"));
    }

    #[test]
    fn years_input_is_validated_and_clamped() {
        let out = run_script("years abc\nyears 0\n", CSV);
        assert!(out.contains("error: years must be a whole number"));
        assert!(out.contains("years: 1"));
    }

    #[test]
    fn reset_program_prefers_existing_selection() {
        let programs = vec!["A".to_string(), "B".to_string()];
        let mut selection = Selection::new(Horizon::default());
        selection.reset_program(&programs);
        assert_eq!(selection.program.as_deref(), Some("A"));
        selection.program = Some("B".to_string());
        selection.reset_program(&programs);
        assert_eq!(selection.program.as_deref(), Some("B"));
        selection.reset_program(&["C".to_string()]);
        assert_eq!(selection.program.as_deref(), Some("C"));
    }
}
