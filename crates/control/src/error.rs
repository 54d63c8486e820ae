//! Error types for the control crate.

use thiserror::Error;

/// Result type for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the master.
#[derive(Error, Debug)]
pub enum Error {
    /// A status line did not match `PACKAGE.APP (HOST:PID) ...`.
    #[error("malformed status line '{line}': {reason}")]
    MalformedStatusLine { line: String, reason: String },

    /// The master answered with a non-success status.
    #[error("master returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The master could not be reached.
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Credentials are malformed or were rejected.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// Configuration error.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] drover_core::Error),
}

impl Error {
    /// Create a malformed status line error.
    pub fn malformed_status_line(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedStatusLine {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create an upstream error.
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create a timeout error.
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a config error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Check if the caller may retry the failed request.
    ///
    /// The client itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, .. } => *status >= 500,
            Self::Timeout { .. } | Self::ConnectionFailed { .. } => true,
            _ => false,
        }
    }
}
