//! Local credential file.

use std::fmt;
use std::path::Path;

use drover_core::fs::read_optional_file;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Basic-Auth credentials for the master.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read credentials from `path`. A missing file means anonymous access.
///
/// # Errors
///
/// Returns [`Error::Auth`] if the file exists but is not a valid credential
/// document, or [`Error::Core`] if it cannot be read.
pub fn load_credentials(path: &Path) -> Result<Option<Credentials>> {
    let Some(content) = read_optional_file(path)? else {
        debug!(path = %path.display(), "No credential file, continuing anonymously");
        return Ok(None);
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::auth(format!("malformed credential file {}: {e}", path.display())))
}
