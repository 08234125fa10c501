//! Error types for strata operations.
//!
//! Errors follow the taxonomy of a graph build:
//!
//! - **Source errors** (a mandatory record source is unreadable or malformed)
//!   abort the build and surface as [`Error::Source`].
//! - **Unresolved references** are never errors. They are accumulated in
//!   [`MissingReferences`](crate::MissingReferences) on the build report.
//! - **Not found** is returned when a query names an id absent from the graph.
//! - **Persistence failures** surface with their underlying cause; the
//!   in-memory graph is left untouched.

use thiserror::Error;

pub use strata_records::{SourceError, SourceWarning, SourceWarningKind};

/// Result type for strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for strata operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A query addressed a node that is not in the graph
    #[error("node not found: {0}")]
    NotFound(String),

    /// A query was well formed but cannot be answered as asked
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A mandatory record source could not be read or understood
    #[error("record source error: {0}")]
    Source(#[from] SourceError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Graph (de)serialization failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// An internal invariant was violated (poisoned lock, corrupt store row)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means "the addressed node does not exist".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = Error::NotFound("CONTROLM::NOPE".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "node not found: CONTROLM::NOPE");
        assert!(!Error::Config("x".to_string()).is_not_found());
    }

    #[test]
    fn source_error_keeps_cause_chain() {
        let inner = SourceError::malformed("ctm.xml", "no FOLDER or JOB element found");
        let err = Error::from(inner);

        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert!(err.to_string().contains("ctm.xml"));
    }
}
