#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # drover-control
//!
//! Talks to the master: status reporting, bulk fan-out commands over the
//! status line grammar, and uptime formatting.
//!
//! ## Example
//!
//! ```ignore
//! use drover_control::{ControlClient, ControlConfig};
//!
//! let client = ControlClient::with_config(ControlConfig::from_env())?;
//! let outcome = client.bulk_control(lines, "restart").await?;
//! for rejected in &outcome.rejected {
//!     eprintln!("{rejected}");
//! }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod error;
pub mod status;

pub use client::{BulkOutcome, ControlClient, RequestMethod};
pub use config::{CREDENTIALS_ENV, ControlConfig, MASTER_URL_ENV, TIMEOUT_ENV};
pub use credentials::{Credentials, load_credentials};
pub use duration::format_duration;
pub use error::{Error, Result};
pub use status::{NodeStatus, StatusBatch, parse_status_line, parse_status_lines};
