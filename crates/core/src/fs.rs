//! File helpers with the error mapping every drover crate wants.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Read a whole file into a string.
///
/// # Errors
///
/// Returns [`Error::FileReadFailed`] naming the path if the file cannot be read.
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::file_read_failed(path, e.to_string()))
}

/// Read a file that is allowed to be absent.
///
/// A missing file yields `Ok(None)`; any other failure is an error.
///
/// # Errors
///
/// Returns [`Error::FileReadFailed`] if the file exists but cannot be read.
pub fn read_optional_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::file_read_failed(path, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_file_missing() {
        let result = read_file(Path::new("/nonexistent/drover/cluster.yaml"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_read_optional_file_missing_is_none() -> Result<()> {
        let content = read_optional_file(Path::new("/nonexistent/drover/credentials.toml"))?;
        assert!(content.is_none());
        Ok(())
    }

    #[test]
    fn test_read_optional_file_present() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "username = \"ops\"")?;

        let content = read_optional_file(file.path())?;
        assert_eq!(content.as_deref(), Some("username = \"ops\""));
        Ok(())
    }
}
