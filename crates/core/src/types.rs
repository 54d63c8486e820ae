//! Identifiers shared across the reconciler, spawner, and control client.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Separates a package from an app (`shop.web`). App names never contain it.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Opaque host identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    /// Create a host identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The host name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Host {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Host {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Validated app name: non-empty, no whitespace, no namespace separator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    /// Validate and wrap an app name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAppName`] if the name is empty, contains
    /// whitespace, or contains [`NAMESPACE_SEPARATOR`].
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_app_name(name, "name is empty"));
        }
        if name.contains(NAMESPACE_SEPARATOR) {
            return Err(Error::invalid_app_name(
                name,
                format!("contains namespace separator '{NAMESPACE_SEPARATOR}'"),
            ));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(Error::invalid_app_name(name, "contains whitespace"));
        }
        Ok(Self(name))
    }

    /// The app name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AppName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AppName> for String {
    fn from(name: AppName) -> Self {
        name.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One worker slot of an app. Unique per host, not globally.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerKey {
    pub app: AppName,
    /// Slot index, starting at 1.
    pub slot: u32,
}

impl WorkerKey {
    /// Create a worker key.
    #[must_use]
    pub const fn new(app: AppName, slot: u32) -> Self {
        Self { app, slot }
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.app, self.slot)
    }
}

/// Stable hash of an effective definition.
///
/// Two fingerprints are equal iff the definitions they were computed from
/// serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a serializable definition (SHA-256 over its JSON form).
    ///
    /// Maps must be ordered (`BTreeMap`) for the result to be stable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FingerprintFailed`] if the value cannot be serialized.
    pub fn of<T: Serialize>(definition: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(definition)
            .map_err(|e| Error::fingerprint_failed(e.to_string()))?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Fingerprint raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Lowercase hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
