// API key resolution for the HTTP backend.
//
// Keys come from one of two places, chosen by configuration:
// 1. An operator-provisioned secret (secrets.toml, then the environment,
//    which includes anything loaded from .env)
// 2. A key the user types in at runtime
//
// An explicit --api-key always wins. Keys are never written to the config
// file or the LM log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default variable / secrets entry holding the key.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Secrets file looked up in the working directory when none is configured.
pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";

/// Where the operator expects the key to come from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Operator-provisioned secret (secrets.toml or environment)
    #[default]
    Secret,
    /// Ask the user for the key at runtime
    Prompt,
}

/// Where a resolved key actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Flag,
    SecretsFile,
    Environment,
    Prompt,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Flag => "flag",
            KeySource::SecretsFile => "secrets file",
            KeySource::Environment => "environment",
            KeySource::Prompt => "prompt",
            KeySource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

impl KeyLookup {
    fn found(key: String, source: KeySource) -> Self {
        Self {
            key: Some(key),
            source,
        }
    }

    fn missing() -> Self {
        Self {
            key: None,
            source: KeySource::None,
        }
    }
}

/// Inputs for key resolution, gathered from CLI flags and config.
#[derive(Debug, Clone)]
pub struct KeyRequest<'a> {
    pub explicit: Option<&'a str>,
    pub source: CredentialSource,
    pub name: &'a str,
    pub secrets_file: Option<&'a Path>,
}

/// Resolve the API key.
///
/// `env` looks up process variables and `prompt` asks the user; both are
/// injected so resolution stays testable. Blank values count as absent.
pub fn resolve_api_key(
    request: &KeyRequest<'_>,
    env: impl Fn(&str) -> Option<String>,
    prompt: impl FnOnce() -> Result<Option<String>>,
) -> Result<KeyLookup> {
    if let Some(key) = non_blank(request.explicit.map(str::to_string)) {
        return Ok(KeyLookup::found(key, KeySource::Flag));
    }
    match request.source {
        CredentialSource::Secret => {
            let secrets_path = request
                .secrets_file
                .map(Path::to_path_buf)
                .or_else(default_secrets_file);
            if let Some(path) = secrets_path {
                if let Some(key) = non_blank(read_secrets_file(&path, request.name)?) {
                    return Ok(KeyLookup::found(key, KeySource::SecretsFile));
                }
            }
            if let Some(key) = non_blank(env(request.name)) {
                return Ok(KeyLookup::found(key, KeySource::Environment));
            }
            Ok(KeyLookup::missing())
        }
        CredentialSource::Prompt => match non_blank(prompt()?) {
            Some(key) => Ok(KeyLookup::found(key, KeySource::Prompt)),
            None => Ok(KeyLookup::missing()),
        },
    }
}

/// Ask for the key on the terminal without echoing it.
pub fn prompt_for_key(name: &str) -> Result<Option<String>> {
    let key = dialoguer::Password::new()
        .with_prompt(format!("Enter {name}"))
        .allow_empty_password(true)
        .interact()
        .context("read API key from terminal")?;
    Ok(Some(key))
}

/// `secrets.toml` in the working directory, then the user config dir.
fn default_secrets_file() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_SECRETS_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("eduf").join(DEFAULT_SECRETS_FILE))
        .filter(|path| path.is_file())
}

/// Read a top-level string entry from a TOML secrets file. A missing file
/// is not an error; a malformed one is.
fn read_secrets_file(path: &Path, name: &str) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read secrets file {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&text).with_context(|| format!("parse secrets file {}", path.display()))?;
    Ok(table
        .get(name)
        .and_then(toml::Value::as_str)
        .map(str::to_string))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
