//! Tool configuration.
//!
//! The config file is optional and versioned. Missing fields take defaults,
//! so an empty `{"schema_version": 1}` is a valid config. CLI flags are
//! layered on top when a command resolves its context.
use crate::credentials::{CredentialSource, DEFAULT_API_KEY_ENV};
use crate::lm_client::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::prompt::{PromptOptions, DEFAULT_HORIZON, MAX_HORIZON, MIN_HORIZON};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Config file read from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "eduf.json";

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "EDUF_CONFIG";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_true() -> bool {
    true
}

fn default_horizon() -> u8 {
    DEFAULT_HORIZON
}

/// Which text-generation backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Gemini {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Command {
        command: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Gemini {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub credential_source: CredentialSource,
    /// Secrets entry / environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
    /// Whether follow-up questions are offered after an analysis.
    #[serde(default = "default_true")]
    pub qa_enabled: bool,
    #[serde(default)]
    pub prompt: PromptOptions,
    #[serde(default = "default_horizon")]
    pub default_horizon: u8,
}

/// Build the default config used when no file exists.
pub fn default_config() -> ForecastConfig {
    ForecastConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        backend: BackendConfig::default(),
        credential_source: CredentialSource::default(),
        api_key_env: default_api_key_env(),
        secrets_file: None,
        qa_enabled: true,
        prompt: PromptOptions::default(),
        default_horizon: DEFAULT_HORIZON,
    }
}

pub fn load_config(path: &Path) -> Result<ForecastConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ForecastConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &ForecastConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Load the config from `explicit`, else `EDUF_CONFIG`, else `eduf.json`
/// in the working directory, else defaults. An explicitly named file must
/// exist; the fallback file is optional.
pub fn resolve_config(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(ForecastConfig, Option<PathBuf>)> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_ENV).map(PathBuf::from));
    let path = match named {
        Some(path) => path,
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.is_file() {
                return Ok((default_config(), None));
            }
            fallback
        }
    };
    let config = load_config(&path)?;
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    Ok((config, Some(path)))
}

pub fn validate_config(config: &ForecastConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    match &config.backend {
        BackendConfig::Gemini {
            model,
            base_url,
            timeout_secs,
        } => {
            if model.trim().is_empty() {
                return Err(anyhow!("backend.model must be non-empty"));
            }
            if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
                return Err(anyhow!(
                    "backend.base_url must be an http(s) URL (got {base_url:?})"
                ));
            }
            if *timeout_secs == 0 {
                return Err(anyhow!("backend.timeout_secs must be positive"));
            }
        }
        BackendConfig::Command { command } => {
            if command.trim().is_empty() {
                return Err(anyhow!("backend.command must be non-empty"));
            }
        }
    }
    if config.api_key_env.trim().is_empty() {
        return Err(anyhow!("api_key_env must be non-empty"));
    }
    if config.prompt.sections.is_empty() {
        return Err(anyhow!("prompt.sections must list at least one section"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = config
        .prompt
        .sections
        .iter()
        .find(|section| !seen.insert(**section))
    {
        return Err(anyhow!("prompt.sections lists {dup:?} more than once"));
    }
    if !(MIN_HORIZON..=MAX_HORIZON).contains(&config.default_horizon) {
        return Err(anyhow!(
            "default_horizon must be between {MIN_HORIZON} and {MAX_HORIZON} (got {})",
            config.default_horizon
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
