use crate::cli::GlobalArgs;
use crate::config::{self, BackendConfig, ForecastConfig};
use crate::credentials::{self, CredentialSource, KeyRequest};
use crate::lm_client::{CommandGenerator, GeminiGenerator, TextGenerator, LM_COMMAND_ENV};
use crate::lm_log::LmLog;
use crate::prompt::Horizon;
use crate::session::Session;
use anyhow::Result;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

/// Config plus CLI overrides, resolved once per invocation.
pub(crate) struct ForecastContext {
    pub(crate) config: ForecastConfig,
    pub(crate) config_path: Option<PathBuf>,
    global: GlobalArgs,
}

impl ForecastContext {
    pub(crate) fn load(global: &GlobalArgs) -> Result<Self> {
        let (mut config, config_path) =
            config::resolve_config(global.config.as_deref(), |name| std::env::var(name).ok())?;
        if global.no_qa {
            config.qa_enabled = false;
        }
        if let Some(persona) = global.persona {
            config.prompt.persona = persona;
        }
        if let Some(language) = global.language {
            config.prompt.language = language;
        }
        if let Some(source) = global.credential_source {
            config.credential_source = source;
        }
        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "loaded config");
        }
        Ok(Self {
            config,
            config_path,
            global: global.clone(),
        })
    }

    /// Horizon from raw user input, clamped; config default when absent.
    pub(crate) fn horizon(&self, years: Option<i64>) -> Horizon {
        match years {
            Some(years) => Horizon::clamped(years),
            None => Horizon::new(u32::from(self.config.default_horizon)).unwrap_or_default(),
        }
    }

    /// Session without a backend, for commands that never generate.
    pub(crate) fn offline_session(&self) -> Session {
        Session::new(self.config.prompt.clone(), self.config.qa_enabled)
            .without_generator("generation is not available for this command")
    }

    /// Session wired to the resolved backend. A missing credential is not
    /// an error here: the session refuses generation and the warning is
    /// printed once.
    pub(crate) fn session(&self) -> Result<Session> {
        let session = Session::new(self.config.prompt.clone(), self.config.qa_enabled);
        let session = match self.generator()? {
            Ok(generator) => {
                tracing::debug!(backend = %generator.describe(), "LM backend ready");
                session.with_generator(generator)
            }
            Err(reason) => {
                eprintln!("warning: {reason}; generation is disabled");
                session.without_generator(reason)
            }
        };
        match &self.global.log_dir {
            Some(dir) => Ok(session.with_lm_log(LmLog::open(dir, self.global.verbose)?)),
            None => Ok(session),
        }
    }

    /// Resolve the backend: `--lm`, then `EDUF_LM_COMMAND`, then config.
    fn generator(&self) -> Result<Result<Box<dyn TextGenerator>, String>> {
        let command = self
            .global
            .lm
            .clone()
            .or_else(|| std::env::var(LM_COMMAND_ENV).ok())
            .filter(|command| !command.trim().is_empty());
        if let Some(command) = command {
            return Ok(Ok(Box::new(CommandGenerator::new(command))));
        }
        match &self.config.backend {
            BackendConfig::Command { command } => {
                Ok(Ok(Box::new(CommandGenerator::new(command.clone()))))
            }
            BackendConfig::Gemini {
                model,
                base_url,
                timeout_secs,
            } => {
                let name = self.config.api_key_env.as_str();
                let request = KeyRequest {
                    explicit: self.global.api_key.as_deref(),
                    source: self.config.credential_source,
                    name,
                    secrets_file: self.config.secrets_file.as_deref(),
                };
                let lookup = credentials::resolve_api_key(
                    &request,
                    |var| std::env::var(var).ok(),
                    || {
                        if std::io::stdin().is_terminal() {
                            credentials::prompt_for_key(name)
                        } else {
                            Ok(None)
                        }
                    },
                )?;
                let Some(key) = lookup.key else {
                    return Ok(Err(missing_key_reason(self.config.credential_source, name)));
                };
                tracing::debug!(source = lookup.source.as_str(), "API key resolved");
                Ok(Ok(Box::new(GeminiGenerator::new(
                    key,
                    model.clone(),
                    base_url.clone(),
                    Duration::from_secs(*timeout_secs),
                ))))
            }
        }
    }
}

fn missing_key_reason(source: CredentialSource, name: &str) -> String {
    match source {
        CredentialSource::Secret => format!(
            "no API key found: set {name} in secrets.toml or the environment, or pass --api-key"
        ),
        CredentialSource::Prompt => {
            format!("no API key entered: run interactively to type {name}, or pass --api-key")
        }
    }
}
