//! Error types for record extraction.
//!
//! Errors are split the same way the graph builder consumes them:
//!
//! - **`SourceError`**: a record source could not be opened or is structurally
//!   invalid. Fatal for that source.
//! - **`SourceWarning`**: a single file inside a directory scan failed. Collected
//!   and reported, the rest of the directory is still parsed.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for record extraction.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Error raised when a record source cannot be read or understood.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source file or directory could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The source was readable but did not have the expected structure.
    #[error("malformed record source {}: {message}", path.display())]
    Malformed {
        /// Path of the malformed source.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// An extraction pattern failed to compile.
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A JSON record export could not be decoded.
    #[error("invalid JSON record export {}: {source}", path.display())]
    Json {
        /// Path of the export.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    /// Build an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a malformed-source error for `path`.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path of the source that failed, if the error is tied to one.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } | Self::Malformed { path, .. } | Self::Json { path, .. } => {
                Some(path)
            }
            Self::Pattern(_) => None,
        }
    }
}

/// A per-file problem encountered during a directory scan.
///
/// These are collected during parsing but don't halt the scan.
#[derive(Debug, Clone)]
pub struct SourceWarning {
    /// File that failed
    pub path: PathBuf,
    /// Category of the problem
    pub kind: SourceWarningKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for SourceWarning {}

/// Categorization of per-file problems.
///
/// Input problems are issues with the estate's files; internal problems are
/// failures of the environment the scan runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceWarningKind {
    // === Input Problems ===
    /// File content did not match the expected record shape
    Malformed,

    /// File content is not valid UTF-8
    EncodingError,

    /// Two files declared the same logical name; the later one won
    DuplicateName,

    // === Internal Problems ===
    /// Could not read the file or directory from disk
    IoError,

    /// The extractor itself failed
    Internal,
}

impl std::fmt::Display for SourceWarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed"),
            Self::EncodingError => write!(f, "encoding error"),
            Self::DuplicateName => write!(f, "duplicate name"),
            Self::IoError => write!(f, "I/O error"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl SourceWarningKind {
    /// Returns `true` if this is a problem with the scanned files themselves.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed | Self::EncodingError | Self::DuplicateName
        )
    }

    /// Returns `true` if this is a problem with the scanning environment.
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::IoError | Self::Internal)
    }
}

impl SourceWarning {
    /// Create a new warning.
    #[must_use]
    pub fn new(path: PathBuf, kind: SourceWarningKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create a warning for a file that shadowed an earlier one with the same name.
    #[must_use]
    pub fn duplicate(path: PathBuf, name: &str) -> Self {
        Self::new(
            path,
            SourceWarningKind::DuplicateName,
            format!("logical name {name} already defined by another file"),
        )
    }
}

impl From<SourceError> for SourceWarning {
    fn from(error: SourceError) -> Self {
        let path = error.path().map(std::path::Path::to_path_buf).unwrap_or_default();
        match error {
            SourceError::Io { source, .. } => {
                let kind = if source.kind() == std::io::ErrorKind::InvalidData {
                    SourceWarningKind::EncodingError
                } else {
                    SourceWarningKind::IoError
                };
                Self::new(path, kind, source.to_string())
            }
            SourceError::Malformed { message, .. } => {
                Self::new(path, SourceWarningKind::Malformed, message)
            }
            SourceError::Json { source, .. } => {
                Self::new(path, SourceWarningKind::Malformed, source.to_string())
            }
            SourceError::Pattern(source) => {
                Self::new(path, SourceWarningKind::Internal, source.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_kind_categorization() {
        assert!(SourceWarningKind::Malformed.is_input_error());
        assert!(SourceWarningKind::EncodingError.is_input_error());
        assert!(SourceWarningKind::DuplicateName.is_input_error());
        assert!(!SourceWarningKind::Malformed.is_internal_error());

        assert!(SourceWarningKind::IoError.is_internal_error());
        assert!(!SourceWarningKind::IoError.is_input_error());
    }

    #[test]
    fn warning_display_includes_path_and_kind() {
        let warning = SourceWarning::new(
            PathBuf::from("src/ADAQOSL.pl1"),
            SourceWarningKind::Malformed,
            "no program declaration",
        );

        let display = warning.to_string();
        assert!(display.contains("ADAQOSL.pl1"));
        assert!(display.contains("no program declaration"));
        assert!(display.contains("malformed"));
    }

    #[test]
    fn invalid_data_io_error_becomes_encoding_warning() {
        let error = SourceError::io(
            "jobs/BAD.jcl",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
        );

        let warning = SourceWarning::from(error);
        assert_eq!(warning.kind, SourceWarningKind::EncodingError);
        assert_eq!(warning.path, PathBuf::from("jobs/BAD.jcl"));
    }
}
