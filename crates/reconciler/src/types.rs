//! Core types for the reconciler.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use drover_core::{Fingerprint, Host, WorkerKey};

/// Desired state declaration.
///
/// Worker keys each host should run, tagged with the fingerprint of what
/// the key runs. Rebuilt wholesale from every new cluster document.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub hosts: HashMap<Host, BTreeMap<WorkerKey, Fingerprint>>,
}

impl DesiredState {
    /// Create a new empty desired state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Desired keys on a host with their fingerprints.
    #[must_use]
    pub fn on_host(&self, host: &Host) -> Option<&BTreeMap<WorkerKey, Fingerprint>> {
        self.hosts.get(host)
    }

    /// Current fingerprint of a key on a host, if the key is desired there.
    #[must_use]
    pub fn fingerprint(&self, host: &Host, key: &WorkerKey) -> Option<&Fingerprint> {
        self.hosts.get(host).and_then(|keys| keys.get(key))
    }

    /// Total number of desired keys across hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.values().map(BTreeMap::len).sum()
    }

    /// Check if nothing is desired anywhere.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One running worker as recorded by `node_started`.
#[derive(Debug, Clone)]
pub struct RunningInstance {
    /// Fingerprint of the key's definition when it was started. `None` if
    /// the key was not desired at that moment.
    pub fingerprint_at_start: Option<Fingerprint>,
    pub started_at: Instant,
}

impl RunningInstance {
    /// Time since `node_started`.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Actual state: what has been reported started and not yet stopped.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub hosts: HashMap<Host, BTreeMap<WorkerKey, RunningInstance>>,
}

impl ObservedState {
    /// Create a new empty observed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of running instances across hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.values().map(BTreeMap::len).sum()
    }

    /// Check if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a running instance must be stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillReason {
    /// The key is no longer desired on its host.
    NotDesired,
    /// The key's definition changed since it was started.
    DefinitionChanged {
        started: Option<Fingerprint>,
        current: Fingerprint,
    },
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDesired => write!(f, "no longer desired"),
            Self::DefinitionChanged { started, current } => write!(
                f,
                "definition changed ({} -> {})",
                started.as_ref().map_or("none", Fingerprint::short),
                current.short()
            ),
        }
    }
}

/// A running instance `kill_check` wants stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillOrder {
    pub host: Host,
    pub key: WorkerKey,
    pub reason: KillReason,
}

impl KillOrder {
    /// Get a description of the order.
    #[must_use]
    pub fn description(&self) -> String {
        format!("stop {} on {}: {}", self.key, self.host, self.reason)
    }
}

/// Counts describing how far observed state is from desired state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub desired: usize,
    pub running: usize,
    pub pending_launch: usize,
    pub pending_kill: usize,
}

impl StateSummary {
    /// Whether observed state mirrors desired state.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.pending_launch == 0 && self.pending_kill == 0
    }
}
