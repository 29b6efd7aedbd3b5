//! Error types for the monitoring run
//!
//! Network and page-shape trouble during resolution is deliberately *not*
//! represented here: those paths degrade into Inactive/ambiguous verdicts
//! (see `resolver`) so that no single reference can abort a run. `WatchError`
//! covers the failures that genuinely stop work: bad configuration, a dead
//! article source, a dead sink.

use thiserror::Error;

/// Result type alias for monitoring operations
pub type WatchResult<T> = Result<T, WatchError>;

/// Error types for monitoring operations
#[derive(Debug, Error)]
pub enum WatchError {
    /// HTTP client construction or request failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The article source failed to deliver articles
    #[error("Article source error: {0}")]
    Source(String),

    /// The record sink rejected an upsert
    #[error("Record sink error: {0}")]
    Sink(String),

    /// Run was cancelled before completion
    #[error("Monitoring run was cancelled")]
    Cancelled,

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for WatchError {
    fn from(error: anyhow::Error) -> Self {
        WatchError::Other(error.to_string())
    }
}
