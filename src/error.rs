//! Error handling for the ML PID tasks
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the library. Track rejections are not errors; they are
//! reported through [`crate::features::Rejection`].

use thiserror::Error;

/// Main error type for ML PID operations
#[derive(Error, Debug)]
pub enum MlPidError {
    /// The peer sent something the protocol does not allow at this point
    /// (bad count, short read, premature close). Fatal for the run.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was attempted in the wrong channel or task state
    #[error("Invalid state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MlPidError>,
    },
}

impl MlPidError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MlPidError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Map an IO error from a framed read into a protocol error when the peer
    /// closed the stream mid-message.
    pub fn from_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            MlPidError::Protocol(format!("peer closed the stream while reading {}", what))
        } else {
            MlPidError::Io(err)
        }
    }

    /// Whether this error (or the error it wraps) is a protocol desynchronization
    pub fn is_protocol(&self) -> bool {
        match self {
            MlPidError::Protocol(_) => true,
            MlPidError::WithContext { source, .. } => source.is_protocol(),
            _ => false,
        }
    }
}

/// Result type alias for ML PID operations
pub type Result<T> = std::result::Result<T, MlPidError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MlPidError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| MlPidError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MlPidError::Protocol("class count 0".to_string());
        assert_eq!(err.to_string(), "Protocol error: class count 0");
    }

    #[test]
    fn test_error_with_context() {
        let err = MlPidError::Protocol("short read".to_string());
        let with_ctx = err.with_context("Reading vocabulary");
        assert!(with_ctx.to_string().contains("Reading vocabulary"));
        assert!(with_ctx.is_protocol());
    }

    #[test]
    fn test_eof_maps_to_protocol() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(MlPidError::from_read(eof, "class count").is_protocol());

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!MlPidError::from_read(broken, "class count").is_protocol());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = MlPidError::InvalidState {
            expected: "Ready",
            found: "Closed",
        };
        assert_eq!(err.to_string(), "Invalid state: expected Ready, found Closed");
    }
}
