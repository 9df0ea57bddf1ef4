//! Shared test infrastructure for integration tests.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Environment variables that would leak the developer's setup into a run.
const ISOLATED_VARS: &[&str] = &[
    "EDUF_CONFIG",
    "EDUF_LM_COMMAND",
    "GEMINI_API_KEY",
    "RUST_LOG",
];

pub fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

pub fn fixture(name: &str) -> PathBuf {
    manifest_dir().join("tests/fixtures").join(name)
}

/// `--lm` value that runs the mock script through `sh`.
pub fn mock_lm() -> String {
    format!("sh {}", manifest_dir().join("tests/mock-lm.sh").display())
}

pub fn sh_available() -> bool {
    let available = which::which("sh").is_ok();
    if !available {
        eprintln!("Skipping: sh not available");
    }
    available
}

/// Isolated working directory for one `eduf` invocation.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn temp() -> Self {
        Self {
            dir: TempDir::new().expect("create temp workspace"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_eduf"));
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"));
        for var in ISOLATED_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run eduf")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
