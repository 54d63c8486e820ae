//! Error types for the reconciler crate.
//!
//! Only loading a desired-state document can fail. Reconciliation itself
//! reports mismatches as data.

use thiserror::Error;

/// Result type alias for cluster document operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A desired-state document that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be read.
    #[error("cannot read cluster document: {0}")]
    Read(#[from] drover_core::Error),

    /// The document is not valid YAML or does not match the schema.
    #[error("malformed cluster document: {reason}")]
    Malformed { reason: String },

    /// An app names a host the document does not declare.
    #[error("app '{app}' references unknown host '{host}'")]
    UnknownHost { app: String, host: String },

    /// A worker count below zero.
    #[error("app '{app}' declares negative worker count {count}")]
    NegativeWorkerCount { app: String, count: i64 },

    /// Two apps share a name.
    #[error("app '{app}' is declared more than once")]
    DuplicateApp { app: String },

    /// A host is declared twice.
    #[error("host '{host}' is declared more than once")]
    DuplicateHost { host: String },

    /// App name is empty or contains the namespace separator.
    #[error("invalid app name: {reason}")]
    InvalidAppName { reason: String },

    /// A slot override outside `1..=workers`.
    #[error("app '{app}' overrides slot {slot} but declares {workers} workers")]
    SlotOutOfRange { app: String, slot: u32, workers: u32 },
}

impl ConfigError {
    /// Create a malformed document error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Create an unknown host error.
    pub fn unknown_host(app: impl Into<String>, host: impl Into<String>) -> Self {
        Self::UnknownHost {
            app: app.into(),
            host: host.into(),
        }
    }

    /// Create a duplicate app error.
    pub fn duplicate_app(app: impl Into<String>) -> Self {
        Self::DuplicateApp { app: app.into() }
    }

    /// Create a duplicate host error.
    pub fn duplicate_host(host: impl Into<String>) -> Self {
        Self::DuplicateHost { host: host.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::unknown_host("web", "node9");
        assert!(err.to_string().contains("web"));
        assert!(err.to_string().contains("node9"));
    }

    #[test]
    fn test_negative_count_display() {
        let err = ConfigError::NegativeWorkerCount {
            app: "web".to_string(),
            count: -1,
        };
        assert!(err.to_string().contains("-1"));
    }
}
