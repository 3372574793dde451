//! Error types for kbchat.
//!
//! Library crates use [`KbChatError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all kbchat operations.
#[derive(Debug, thiserror::Error)]
pub enum KbChatError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the model endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The generative model answered with an error or an unusable reply.
    #[error("model error: {0}")]
    Model(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record addressed by id does not exist (anymore).
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Admin credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty batch, bad file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KbChatError>;

impl KbChatError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error for a knowledge document id.
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "document",
            id: id.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the addressed record is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = KbChatError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = KbChatError::validation("no markdown files selected");
        assert!(err.to_string().contains("no markdown files"));
    }

    #[test]
    fn not_found_mentions_id() {
        let err = KbChatError::document_not_found("0190-abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "document not found: 0190-abc");
        assert!(!KbChatError::Storage("boom".into()).is_not_found());
    }
}
