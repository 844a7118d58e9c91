//! Error types for the pod provider.

use crate::runtime::RuntimeError;
use std::path::PathBuf;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the provider core.
///
/// Every lifecycle operation either succeeds or returns exactly one of these.
/// Nothing is swallowed apart from the documented no-op volume sources and
/// the status fallback for containers the runtime no longer knows about.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Malformed pod descriptor or request (e.g. zero containers).
    #[error("invalid request: {0}")]
    Validation(String),

    /// No tracker entry (or tracked container) for the requested pod.
    #[error("not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Filesystem failure while materializing volumes or reading config.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by the container runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    // =========================================================================
    // Ambient Errors
    // =========================================================================
    /// Invalid provider configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors caused by the caller's input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the pod or container was not tracked.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
