//! Error types for bizscout.
//!
//! Library crates use [`BizScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::schema::ValidationError;

/// Top-level error type for all bizscout operations.
#[derive(Debug, thiserror::Error)]
pub enum BizScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Upstream request failed before a response was received, or the
    /// upstream API reported a failure in its payload.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// Upstream did not answer within the configured timeout.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// Response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Query or write against the record store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The record store could not be opened at startup.
    #[error("connection error: {0}")]
    Connection(String),

    /// A record failed its field ruleset.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An entity expected at merge time is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BizScoutError>;

impl BizScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures of an external API or website fetch.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::Timeout { .. } | Self::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldError;

    #[test]
    fn error_display_formatting() {
        let err = BizScoutError::config("missing HUNTER_API_KEY");
        assert_eq!(err.to_string(), "config error: missing HUNTER_API_KEY");

        let err = BizScoutError::Http {
            url: "https://acme.ca/".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://acme.ca/");
    }

    #[test]
    fn validation_error_converts() {
        let validation = ValidationError {
            collection: "people",
            errors: vec![FieldError::new("first_name", "must not be blank")],
        };
        let err: BizScoutError = validation.into();
        assert!(err.to_string().contains("first_name"));
        assert!(!err.is_upstream());
    }

    #[test]
    fn upstream_classification() {
        assert!(BizScoutError::Timeout { url: "x".into() }.is_upstream());
        assert!(BizScoutError::Network("reset".into()).is_upstream());
        assert!(!BizScoutError::Storage("locked".into()).is_upstream());
        assert!(!BizScoutError::Connection("refused".into()).is_upstream());
    }
}
