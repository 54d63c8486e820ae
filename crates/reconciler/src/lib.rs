//! Desired-state reconciliation for a fleet of hosts.
//!
//! This crate implements a reconciliation pattern inspired by Kubernetes:
//!
//! - **Desired State**: worker keys a cluster document declares per host
//! - **Observed State**: worker keys reported started and not yet stopped
//! - **Diff**: `launch_check` and `kill_check` compare the two
//! - **Actions**: the caller launches and stops processes, then reports back
//!
//! # Key Concepts
//!
//! ## Worker keys
//!
//! A [`WorkerKey`](drover_core::WorkerKey) is `(app, slot)`. The same key
//! may run on several hosts at once; state is tracked per host.
//!
//! ## Fingerprints
//!
//! Every desired key carries the fingerprint of what it runs. A running
//! instance remembers the fingerprint it was started with, so changing an
//! app's definition forces a restart even when slot counts stay the same.
//!
//! # Example
//!
//! ```ignore
//! use drover_reconciler::{ClusterConfig, RunningState};
//!
//! let mut state = RunningState::new();
//! let config = ClusterConfig::from_file(path)?;
//! state.update_config(&config);
//!
//! for (host, key) in state.kill_check() {
//!     stop(&host, &key)?;
//!     state.node_stopped(&host, &key);
//! }
//! for key in state.launch_check(&me) {
//!     launch(&key)?;
//!     state.node_started(&me, &key);
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cluster;
pub mod error;
pub mod state;
pub mod types;

// Re-export main types
pub use cluster::{AppSpec, ClusterConfig, DEFAULT_NAMESPACE, SlotOverride};
pub use error::{ConfigError, Result};
pub use state::RunningState;
pub use types::{
    DesiredState, KillOrder, KillReason, ObservedState, RunningInstance, StateSummary,
};
