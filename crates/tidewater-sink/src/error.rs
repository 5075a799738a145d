//! Sink error types.
//!
//! Provides [`SinkError`] for the reconciliation operator, plus a
//! convenience [`SinkResult`] alias.
//!
//! Only [`SinkError::Extraction`] is recovered locally (the table is
//! blacklisted). Every other variant that escapes the operator is fatal to
//! the instance and left to the surrounding runtime's restart policy.

use thiserror::Error;

use tidewater_catalog::CatalogError;

/// Result alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that can occur in the reconciliation sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The raw payload could not be decoded, or a required element
    /// (table pattern path, envelope field) is missing from it.
    #[error("decode error: {0}")]
    Decode(String),

    /// A record could not be projected onto the target table schema.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// A catalog call failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A required configuration key is missing.
    #[error("missing config: {0}")]
    MissingConfig(String),

    /// A configuration value is invalid.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The sink task is no longer running.
    #[error("sink task closed: {0}")]
    Closed(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Decode(format!("JSON parse error: {err}"))
    }
}
