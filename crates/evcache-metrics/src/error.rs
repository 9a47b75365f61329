//! Metrics facade error types.

use thiserror::Error;

/// Errors produced while resolving or creating metric instruments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No registry is bound, or the registry could not create the instrument.
    ///
    /// Never cached: the next call for the same key retries creation.
    #[error("metrics backend unavailable")]
    BackendUnavailable,

    /// Malformed metric name or tag.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if the failure is transient backend unavailability.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable)
    }
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, Error>;
