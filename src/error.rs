//! Error taxonomy for dataset handling, prompting and generation.
//!
//! Library code returns `ForecastError`; the CLI wraps it in `anyhow` with
//! context. Nothing here is retried automatically.
use thiserror::Error;

/// Failure reported by a text-generation backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Bad, revoked or missing API key.
    #[error("authentication rejected by LM backend: {0}")]
    Auth(String),
    /// Rate limit or billing quota exhausted.
    #[error("LM quota exhausted: {0}")]
    Quota(String),
    /// Transport failure or timeout before a response arrived.
    #[error("network failure talking to LM backend: {0}")]
    Network(String),
    /// Any other backend failure (bad status, unparseable body, command crash).
    #[error("LM backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("feature disabled: {0}")]
    FeatureDisabled(String),
    #[error("read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ForecastError> = std::result::Result<T, E>;
