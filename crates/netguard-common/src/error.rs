//! Error types shared across the NetGuard Pro workspace.

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for NetGuard Pro operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("store error: {0}")]
    Store(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("collector error: {0}")]
    Collector(String),

    #[error("correlation error: {0}")]
    Correlation(String),

    #[error("ai dispatch error: {0}")]
    AiDispatch(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Whether the operation that produced this error is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Capture(_) | Error::Timeout(_) | Error::Store(_)
        )
    }

    /// Category label used for log fields and health metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Store(_) => "store",
            Error::Capture(_) => "capture",
            Error::Parse(_) => "parse",
            Error::Collector(_) => "collector",
            Error::Correlation(_) => "correlation",
            Error::AiDispatch(_) => "ai_dispatch",
            Error::Configuration(_) => "configuration",
            Error::Timeout(_) => "timeout",
            Error::Serialization(_) => "serialization",
            Error::Generic(_) => "generic",
        }
    }
}
