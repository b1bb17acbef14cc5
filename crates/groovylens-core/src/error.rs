//! Error handling for the groovylens core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the groovylens core
#[derive(Error, Debug)]
pub enum Error {
    /// Input/output related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file failed to parse fatally (the parser itself failed, as opposed
    /// to reporting diagnostics)
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// File that failed to parse
        file: PathBuf,
        /// Error message
        message: String,
    },

    /// Classpath entry could not be read or indexed
    #[error("Classpath error for {entry}: {message}")]
    Classpath {
        /// Offending classpath entry
        entry: PathBuf,
        /// Error message
        message: String,
    },

    /// Dependency resolution failed
    #[error("Dependency resolution failed for {workspace}: {message}")]
    DependencyResolution {
        /// Workspace root the resolution ran against
        workspace: PathBuf,
        /// Error message
        message: String,
    },

    /// File watcher errors
    #[error("File watcher error: {0}")]
    Watcher(String),

    /// An async operation was cancelled
    #[error("Operation '{0}' was cancelled")]
    Cancelled(String),

    /// Input validation errors
    #[error("Validation error in '{field}': {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a parse error
    pub fn parse(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a classpath error
    pub fn classpath(entry: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Classpath {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Create a dependency resolution error
    pub fn dependency_resolution(
        workspace: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::DependencyResolution {
            workspace: workspace.into(),
            message: message.into(),
        }
    }

    /// Create a watcher error
    pub fn watcher(message: impl Into<String>) -> Self {
        Self::Watcher(message.into())
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled(operation.into())
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a cancellation that callers should re-raise
    /// instead of logging and skipping
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<groovylens_utils::Error> for Error {
    fn from(err: groovylens_utils::Error) -> Self {
        match err {
            groovylens_utils::Error::Io(e) => Self::Io(e),
            other => Self::Watcher(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = Error::parse("a.groovy", "unexpected token");
        assert_eq!(err.to_string(), "Parse error in a.groovy: unexpected token");
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(Error::cancelled("indexing").is_cancelled());
        assert!(!Error::validation("uri", "empty").is_cancelled());
    }

    #[test]
    fn test_utils_error_conversion() {
        let err = Error::from(groovylens_utils::Error::watcher("boom"));
        assert!(matches!(err, Error::Watcher(_)));
    }
}
