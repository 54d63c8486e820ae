//! Core error types shared by the drover crates.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("invalid app name '{name}': {reason}")]
    InvalidAppName { name: String, reason: String },

    #[error("failed to fingerprint definition: {reason}")]
    FingerprintFailed { reason: String },
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid app name error.
    pub fn invalid_app_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAppName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a fingerprint error.
    pub fn fingerprint_failed(reason: impl Into<String>) -> Self {
        Self::FingerprintFailed {
            reason: reason.into(),
        }
    }
}
