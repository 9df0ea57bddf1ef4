//! Text-generation backends.
//!
//! Generation is an opaque `prompt -> text` call. Two backends exist:
//!
//! - **command**: any local tool that reads the prompt on stdin and writes
//!   the completion on stdout (`llm`, `ollama run`, a wrapper script).
//! - **gemini**: the Gemini `generateContent` REST endpoint, authenticated
//!   with an API key.
//!
//! # Configuration
//!
//! The backend is resolved in priority order:
//! 1. `--lm` CLI flag (command backend)
//! 2. `EDUF_LM_COMMAND` environment variable (command backend)
//! 3. `backend` in the config file (defaults to gemini)
//!
//! Calls are billable and never retried; every failure is classified and
//! handed straight back to the caller.
use crate::error::GenerationError;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

mod gemini;

pub use gemini::{GeminiGenerator, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};

/// Environment variable naming a local LM command.
pub const LM_COMMAND_ENV: &str = "EDUF_LM_COMMAND";

/// Opaque text completion.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Backend that pipes the prompt through a local command.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    /// The command to invoke (parsed via shell-words).
    command: String,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        invoke_lm_command(&self.command, prompt)
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command)
    }
}

/// Invoke the LM command with the given prompt.
fn invoke_lm_command(command: &str, prompt: &str) -> Result<String, GenerationError> {
    let args = shell_words::split(command)
        .map_err(|err| GenerationError::Backend(format!("parse LM command {command:?}: {err}")))?;
    let Some((program, rest)) = args.split_first() else {
        return Err(GenerationError::Backend("LM command is empty".to_string()));
    };
    let program_path = which::which(program)
        .map_err(|err| GenerationError::Backend(format!("LM command {program:?} not found: {err}")))?;

    let start = Instant::now();
    let mut child = Command::new(&program_path)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| GenerationError::Backend(format!("spawn LM command {program}: {err}")))?;

    // Dropping stdin closes the pipe; the child is reaped even if the write
    // failed so its stderr can explain why.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(prompt.as_bytes()),
        None => Ok(()),
    };

    let output = child
        .wait_with_output()
        .map_err(|err| GenerationError::Backend(format!("wait for LM command: {err}")))?;
    let elapsed_ms = start.elapsed().as_millis();

    if let Err(err) = written {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GenerationError::Backend(format!(
            "write prompt to LM stdin: {err} (LM command exited with status {}: {})",
            output.status,
            stderr.trim()
        )));
    }

    tracing::info!(
        elapsed_ms,
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm command complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GenerationError::Backend(format!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|err| GenerationError::Backend(format!("decode LM stdout as UTF-8: {err}")))
}
