//! Error types for the spawner crate.

use thiserror::Error;

/// Result type for spawn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or launching a worker command.
///
/// Each one is fatal to a single spawn attempt only.
#[derive(Error, Debug)]
pub enum Error {
    /// The entry point is empty or namespaced.
    #[error("invalid entry point '{entry_point}': {reason}")]
    InvalidEntryPoint { entry_point: String, reason: String },

    /// The running executable is not a launcher we know how to re-invoke.
    #[error("unsupported launcher '{program}'")]
    UnsupportedLauncher { program: String },

    /// A direct-mode invocation without a config option to retarget.
    #[error("invocation has no --config option to select an app with")]
    MissingAppSelector,

    /// The operating system refused to start the child.
    #[error("failed to launch '{program}': {reason}")]
    LaunchFailed { program: String, reason: String },

    /// The child could not be stopped or reaped.
    #[error("failed to stop process {pid}: {reason}")]
    StopFailed { pid: u32, reason: String },
}

impl Error {
    /// Create an invalid entry point error.
    pub fn invalid_entry_point(entry_point: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntryPoint {
            entry_point: entry_point.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported launcher error.
    pub fn unsupported_launcher(program: impl Into<String>) -> Self {
        Self::UnsupportedLauncher {
            program: program.into(),
        }
    }

    /// Create a launch failed error.
    pub fn launch_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Create a stop failed error.
    pub fn stop_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            pid,
            reason: reason.into(),
        }
    }
}
