//! Error types for groovylens utilities

use thiserror::Error;

/// Result type alias for utility operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lightweight error types for utility operations
#[derive(Error, Debug)]
pub enum Error {
    /// File watcher errors
    #[cfg(feature = "file-watcher")]
    #[error("File watcher error: {0}")]
    Watcher(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a file watcher error
    #[cfg(feature = "file-watcher")]
    pub fn watcher<S: Into<String>>(msg: S) -> Self {
        Self::Watcher(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[cfg(feature = "file-watcher")]
    #[test]
    fn test_watcher_error_display() {
        let err = Error::watcher("inotify limit reached");
        assert_eq!(
            err.to_string(),
            "File watcher error: inotify limit reached"
        );
    }
}
