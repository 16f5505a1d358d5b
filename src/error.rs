use thiserror::Error;

/// Failures of the generative completion provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion provider rate limited model {model}")]
    RateLimited { model: String },

    #[error("completion provider failed: {0}")]
    Upstream(String),
}

/// Failures of the factual lookup service. Never surfaced past the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("factual lookup unavailable: {0}")]
    Unavailable(String),
}
