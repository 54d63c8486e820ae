#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # drover-core
//!
//! Shared vocabulary for the drover workspace: host and worker identifiers,
//! definition fingerprints, file helpers, and the error type they share.

pub mod error;
pub mod fs;
pub mod result;
pub mod types;

pub use error::{Error, Result};
pub use result::ResultExt;
pub use types::{AppName, Fingerprint, Host, NAMESPACE_SEPARATOR, WorkerKey};
