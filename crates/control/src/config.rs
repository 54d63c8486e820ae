//! Configuration for the control client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable naming the master base URL.
pub const MASTER_URL_ENV: &str = "DROVER_MASTER_URL";
/// Environment variable naming the credential file.
pub const CREDENTIALS_ENV: &str = "DROVER_CREDENTIALS";
/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "DROVER_TIMEOUT_SECS";

/// Configuration for the [`ControlClient`](crate::ControlClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Base URL of the master.
    #[serde(default)]
    pub base_url: Option<Url>,

    /// TOML file with `username` and `password`.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: Option<PathBuf>,

    /// Timeout for each request.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credentials_path: default_credentials_path(),
            timeout: default_timeout(),
        }
    }
}

impl ControlConfig {
    /// Create a config pointing at a master.
    #[must_use]
    pub fn with_master(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Default::default()
        }
    }

    /// Set the credential file.
    #[must_use]
    pub fn credentials(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Talk to the master anonymously.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.credentials_path = None;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; unparsable values are logged and
    /// ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(MASTER_URL_ENV) {
            match url.parse() {
                Ok(parsed) => config.base_url = Some(parsed),
                Err(e) => warn!(variable = MASTER_URL_ENV, error = %e, "Ignoring invalid master URL"),
            }
        }

        if let Some(path) = lookup(CREDENTIALS_ENV) {
            config.credentials_path = Some(PathBuf::from(path));
        }

        if let Some(secs) = lookup(TIMEOUT_ENV) {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(e) => warn!(variable = TIMEOUT_ENV, error = %e, "Ignoring invalid timeout"),
            }
        }

        config
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = drover_core::fs::read_file(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }
}

fn default_credentials_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".drover").join("credentials.toml"))
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
