//! Generation call log.
//!
//! When a log directory is configured, every generation call is appended to
//! `lm_log.jsonl` as newline-delimited JSON:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"call":1,"kind":"analysis","duration_ms":4200,...}
//! {"schema_version":1,"ts":1707900060000,"call":2,"kind":"followup","duration_ms":3100,...}
//! ```
//!
//! With full content enabled, prompts and responses are also stored as
//! `lm_log/call_NNN_<kind>_prompt.txt` and `lm_log/call_NNN_<kind>_response.txt`.
use crate::util::{now_epoch_ms, truncate_string};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Current schema version for lm_log.jsonl entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmInvocationKind {
    /// Forecast analysis for a program.
    Analysis,
    /// Follow-up question against the stored analysis.
    Followup,
}

impl std::fmt::Display for LmInvocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Followup => write!(f, "followup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    /// Schema version for forwards compatibility.
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was finished.
    pub ts: u64,

    /// Call number within the log (1-indexed, continues across sessions).
    pub call: u32,

    pub kind: LmInvocationKind,

    /// Backend description, e.g. `gemini model gemini-2.0-flash`.
    pub backend: String,

    pub duration_ms: u64,

    pub outcome: LmOutcome,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub program: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub horizon: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_bytes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,

    /// Prompt preview (first ~500 bytes) for quick inspection.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing LM log entries with timing.
pub struct LmLogBuilder {
    start: Instant,
    call: u32,
    kind: LmInvocationKind,
    backend: String,
    program: Option<String>,
    horizon: Option<u8>,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    pub fn new(call: u32, kind: LmInvocationKind, backend: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            call,
            kind,
            backend: backend.into(),
            program: None,
            horizon: None,
            prompt_preview: None,
        }
    }

    pub fn with_request(mut self, program: &str, horizon: u8) -> Self {
        self.program = Some(program.to_string());
        self.horizon = Some(horizon);
        self
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let mut preview = truncate_string(prompt, PROMPT_PREVIEW_BYTES);
        if preview.len() < prompt.len() {
            preview.push_str("...");
        }
        self.prompt_preview = Some(preview);
        self
    }

    pub fn success(self, response: &str) -> LmLogEntry {
        let bytes = response.len();
        self.build(LmOutcome::Success, Some(bytes), None)
    }

    pub fn failed(self, error: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Failed, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: LmOutcome,
        response_bytes: Option<usize>,
        error: Option<String>,
    ) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            call: self.call,
            kind: self.kind,
            backend: self.backend,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            program: self.program,
            horizon: self.horizon,
            response_bytes,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only log rooted at a directory.
#[derive(Debug, Clone)]
pub struct LmLog {
    dir: PathBuf,
    store_content: bool,
    next_call: u32,
}

impl LmLog {
    /// Open (or create) a log directory; call numbering continues from any
    /// existing entries.
    pub fn open(dir: &Path, store_content: bool) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            store_content,
            next_call: 1,
        };
        log.next_call = log
            .load()?
            .iter()
            .map(|entry| entry.call)
            .max()
            .unwrap_or(0)
            + 1;
        Ok(log)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("lm_log.jsonl")
    }

    fn content_dir(&self) -> PathBuf {
        self.dir.join("lm_log")
    }

    /// Reserve the next call number.
    pub fn next_call(&mut self) -> u32 {
        let call = self.next_call;
        self.next_call += 1;
        call
    }

    pub fn append(&self, entry: &LmLogEntry) -> Result<()> {
        let log_path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("open lm_log for append: {}", log_path.display()))?;
        let line = serde_json::to_string(entry).context("serialize lm_log entry")?;
        writeln!(file, "{line}").context("write lm_log entry")?;
        Ok(())
    }

    /// Store full prompt/response text when content logging is enabled.
    pub fn store_content(
        &self,
        call: u32,
        kind: LmInvocationKind,
        prompt: &str,
        response: &str,
    ) -> Result<()> {
        if !self.store_content {
            return Ok(());
        }
        let content_dir = self.content_dir();
        fs::create_dir_all(&content_dir).context("create lm_log content directory")?;
        let prompt_path = content_dir.join(format!("call_{call:03}_{kind}_prompt.txt"));
        let response_path = content_dir.join(format!("call_{call:03}_{kind}_response.txt"));
        fs::write(&prompt_path, prompt)
            .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
        fs::write(&response_path, response)
            .with_context(|| format!("write response: {}", response_path.display()))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<LmLogEntry>> {
        let log_path = self.log_path();
        if !log_path.exists() {
            return Ok(Vec::new());
        }
        let file =
            File::open(&log_path).with_context(|| format!("open lm_log: {}", log_path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of lm_log", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LmLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, %err, "skip corrupt lm_log entry");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_load_continue_numbering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = LmLog::open(dir.path(), false).expect("open log");
        let call = log.next_call();
        assert_eq!(call, 1);
        let entry = LmLogBuilder::new(call, LmInvocationKind::Analysis, "command `cat`")
            .with_request("CS", 3)
            .with_prompt_preview("prompt")
            .success("analysis text");
        log.append(&entry).expect("append");
        let entry = LmLogBuilder::new(log.next_call(), LmInvocationKind::Followup, "command `cat`")
            .failed("quota");
        log.append(&entry).expect("append");

        let entries = log.load().expect("load");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].program.as_deref(), Some("CS"));
        assert_eq!(entries[0].response_bytes, Some(13));
        assert_eq!(entries[1].outcome, LmOutcome::Failed);

        let mut reopened = LmLog::open(dir.path(), false).expect("reopen");
        assert_eq!(reopened.next_call(), 3);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("lm_log.jsonl"), "not json\n\n").expect("seed log");
        let log = LmLog::open(dir.path(), false).expect("open log");
        assert!(log.load().expect("load").is_empty());
    }

    #[test]
    fn content_files_written_only_when_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let quiet = LmLog::open(dir.path(), false).expect("open log");
        quiet
            .store_content(1, LmInvocationKind::Analysis, "p", "r")
            .expect("store");
        assert!(!dir.path().join("lm_log").exists());

        let verbose = LmLog::open(dir.path(), true).expect("open log");
        verbose
            .store_content(1, LmInvocationKind::Analysis, "p", "r")
            .expect("store");
        let prompt = dir.path().join("lm_log/call_001_analysis_prompt.txt");
        assert_eq!(fs::read_to_string(prompt).expect("read prompt"), "p");
    }

    #[test]
    fn prompt_preview_is_truncated() {
        let long = "x".repeat(PROMPT_PREVIEW_BYTES + 10);
        let entry = LmLogBuilder::new(1, LmInvocationKind::Analysis, "b")
            .with_prompt_preview(&long)
            .failed("boom");
        let preview = entry.prompt_preview.expect("preview");
        assert_eq!(preview.len(), PROMPT_PREVIEW_BYTES + 3);
        assert!(preview.ends_with("..."));
    }
}
