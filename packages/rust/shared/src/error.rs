//! Error types for toolscope.
//!
//! Library crates use [`ToolScopeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all toolscope operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolScopeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of a specific survey source.
    #[error("network error: {0}")]
    Network(String),

    /// JSON/TOML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad form id, missing sheet column, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A tool's maturity label is neither `early` nor `advanced`.
    #[error("unknown maturity level '{0}'")]
    UnknownMaturity(String),

    /// The requested tool or form does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A survey source could not be reached or answered with an error status.
    #[error("survey source {form_id} unavailable: {reason}")]
    SourceUnavailable { form_id: String, reason: String },

    /// A survey source answered, but the payload was not the expected shape.
    #[error("survey source {form_id} returned a malformed payload: {reason}")]
    MalformedPayload { form_id: String, reason: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ToolScopeError>;

impl ToolScopeError {
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

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// A survey source failure for `form_id`.
    pub fn unavailable(form_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            form_id: form_id.into(),
            reason: reason.into(),
        }
    }

    /// A malformed payload from `form_id`.
    pub fn malformed(form_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            form_id: form_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is degraded locally rather than failing an aggregation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::MalformedPayload { .. } | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ToolScopeError::config("missing API token");
        assert_eq!(err.to_string(), "config error: missing API token");

        let err = ToolScopeError::UnknownMaturity("pilot".into());
        assert_eq!(err.to_string(), "unknown maturity level 'pilot'");

        let err = ToolScopeError::unavailable("aX9", "HTTP 502");
        assert!(err.to_string().contains("aX9"));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn only_source_failures_are_recoverable() {
        assert!(ToolScopeError::unavailable("f", "timeout").is_recoverable());
        assert!(ToolScopeError::malformed("f", "not json").is_recoverable());
        assert!(!ToolScopeError::NotFound("tool 't1'".into()).is_recoverable());
        assert!(!ToolScopeError::UnknownMaturity("x".into()).is_recoverable());
    }
}
