//! Desired-state document parsing.
//!
//! A cluster document declares the hosts of a fleet and the apps that run
//! on them:
//!
//! ```yaml
//! namespace: shop
//! hosts: [node1, node2]
//! apps:
//!   - name: web
//!     command: "python -m shop.web"
//!     version: "1.4.0"
//!     workers: 2
//!     hosts: [node1]
//!     slots:
//!       1: { version: "1.4.1-canary" }
//! ```
//!
//! Parsing validates the whole document up front and precomputes every
//! fingerprint, so the accessors used during reconciliation cannot fail.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use drover_core::{AppName, Fingerprint, Host, NAMESPACE_SEPARATOR, WorkerKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Package name used in status lines when the document sets none.
pub const DEFAULT_NAMESPACE: &str = "drover";

/// One app as declared in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
    pub name: AppName,
    /// Command template; split on whitespace when launched.
    pub command: String,
    pub version: Option<String>,
    /// Workers on each applicable host.
    pub workers: u32,
    /// Explicit host list. `None` means every declared host.
    pub hosts: Option<Vec<Host>>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub slots: BTreeMap<u32, SlotOverride>,
}

impl AppSpec {
    /// Whether this app runs on `host`, given the document's declared hosts.
    #[must_use]
    pub fn applies_to(&self, host: &Host) -> bool {
        self.hosts.as_ref().is_none_or(|hosts| hosts.contains(host))
    }

    fn effective(&self, slot: u32) -> EffectiveDefinition<'_> {
        let overrides = self.slots.get(&slot);
        let mut env = self.env.clone();
        if let Some(o) = overrides {
            env.extend(o.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        EffectiveDefinition {
            command: &self.command,
            version: overrides
                .and_then(|o| o.version.as_deref())
                .or(self.version.as_deref()),
            args: overrides
                .and_then(|o| o.args.as_deref())
                .unwrap_or(&self.args),
            env,
        }
    }
}

/// Per-slot replacement values. Unset fields inherit from the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotOverride {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// What a worker actually runs. Hashed into slot fingerprints.
#[derive(Debug, Serialize)]
struct EffectiveDefinition<'a> {
    command: &'a str,
    version: Option<&'a str>,
    args: &'a [String],
    env: BTreeMap<String, String>,
}

/// The whole app definition, overrides included. Hashed into app fingerprints.
///
/// Worker counts and host lists are left out: they change which keys are
/// desired, not what a key runs.
#[derive(Debug, Serialize)]
struct AppDefinition<'a> {
    command: &'a str,
    version: Option<&'a str>,
    args: &'a [String],
    env: &'a BTreeMap<String, String>,
    slots: &'a BTreeMap<u32, SlotOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    namespace: Option<String>,
    hosts: Vec<String>,
    #[serde(default)]
    apps: Vec<RawApp>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawApp {
    name: String,
    command: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default = "default_workers")]
    workers: i64,
    #[serde(default)]
    hosts: Option<Vec<String>>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    slots: BTreeMap<u32, SlotOverride>,
}

const fn default_workers() -> i64 {
    1
}

/// A parsed, validated desired-state document.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    namespace: String,
    hosts: Vec<Host>,
    apps: BTreeMap<AppName, AppSpec>,
    fingerprints: BTreeMap<AppName, Fingerprint>,
    /// Fingerprint shared by every slot without an override.
    base_fingerprints: BTreeMap<AppName, Fingerprint>,
    override_fingerprints: BTreeMap<WorkerKey, Fingerprint>,
}

impl ClusterConfig {
    /// Load and validate a cluster document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or the document is
    /// invalid (see [`ClusterConfig::from_yaml_str`]).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = drover_core::fs::read_file(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!(
            path = %path.display(),
            hosts = config.hosts.len(),
            apps = config.apps.len(),
            "Loaded cluster document"
        );
        Ok(config)
    }

    /// Parse and validate a cluster document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed YAML, duplicate hosts or apps,
    /// invalid names, negative worker counts, app host lists naming
    /// undeclared hosts, and slot overrides outside `1..=workers`.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawDocument =
            serde_yaml::from_str(content).map_err(|e| ConfigError::malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let namespace = raw
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if !is_valid_token(&namespace) || namespace.contains(NAMESPACE_SEPARATOR) {
            return Err(ConfigError::malformed(format!(
                "invalid namespace '{namespace}'"
            )));
        }

        let mut hosts = Vec::with_capacity(raw.hosts.len());
        let mut seen_hosts = HashSet::new();
        for name in raw.hosts {
            if !is_valid_token(&name) || name.contains(':') {
                return Err(ConfigError::malformed(format!("invalid host name '{name}'")));
            }
            if !seen_hosts.insert(name.clone()) {
                return Err(ConfigError::duplicate_host(name));
            }
            hosts.push(Host::new(name));
        }

        let mut apps = BTreeMap::new();
        for raw_app in raw.apps {
            let app = validate_app(raw_app, &seen_hosts)?;
            if apps.contains_key(&app.name) {
                return Err(ConfigError::duplicate_app(app.name.as_str()));
            }
            apps.insert(app.name.clone(), app);
        }

        let mut fingerprints = BTreeMap::new();
        let mut base_fingerprints = BTreeMap::new();
        let mut override_fingerprints = BTreeMap::new();
        for (name, app) in &apps {
            fingerprints.insert(name.clone(), fingerprint(&app.definition())?);
            base_fingerprints.insert(name.clone(), fingerprint(&app.effective(0))?);
            for slot in app.slots.keys() {
                override_fingerprints.insert(
                    WorkerKey::new(name.clone(), *slot),
                    fingerprint(&app.effective(*slot))?,
                );
            }
        }

        Ok(Self {
            namespace,
            hosts,
            apps,
            fingerprints,
            base_fingerprints,
            override_fingerprints,
        })
    }

    /// Worker keys desired on `host`: slots `1..=workers` of every applicable app.
    ///
    /// An undeclared host has no desired keys.
    #[must_use]
    pub fn per_host_keys(&self, host: &Host) -> BTreeSet<WorkerKey> {
        if !self.hosts.contains(host) {
            return BTreeSet::new();
        }
        self.apps
            .values()
            .filter(|app| app.applies_to(host))
            .flat_map(|app| (1..=app.workers).map(|slot| WorkerKey::new(app.name.clone(), slot)))
            .collect()
    }

    /// Fingerprint of an app's whole effective definition.
    #[must_use]
    pub fn fingerprint(&self, app: &AppName) -> Option<&Fingerprint> {
        self.fingerprints.get(app)
    }

    /// Fingerprint of what one slot runs, with its override applied.
    ///
    /// `None` for unknown apps and slots outside `1..=workers`.
    #[must_use]
    pub fn slot_fingerprint(&self, key: &WorkerKey) -> Option<&Fingerprint> {
        let app = self.apps.get(&key.app)?;
        if key.slot == 0 || key.slot > app.workers {
            return None;
        }
        self.override_fingerprints
            .get(key)
            .or_else(|| self.base_fingerprints.get(&key.app))
    }

    /// App arguments for one slot.
    #[must_use]
    pub fn slot_args(&self, key: &WorkerKey) -> Option<Vec<String>> {
        self.apps
            .get(&key.app)
            .map(|app| app.effective(key.slot).args.to_vec())
    }

    /// Environment for one slot; override entries replace the app's.
    #[must_use]
    pub fn slot_env(&self, key: &WorkerKey) -> Option<BTreeMap<String, String>> {
        self.apps.get(&key.app).map(|app| app.effective(key.slot).env)
    }

    /// Declared hosts, in document order.
    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Apps, ordered by name.
    pub fn apps(&self) -> impl Iterator<Item = &AppSpec> {
        self.apps.values()
    }

    /// Look up one app.
    #[must_use]
    pub fn app(&self, name: &AppName) -> Option<&AppSpec> {
        self.apps.get(name)
    }

    /// Package name for status lines.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl AppSpec {
    fn definition(&self) -> AppDefinition<'_> {
        AppDefinition {
            command: &self.command,
            version: self.version.as_deref(),
            args: &self.args,
            env: &self.env,
            slots: &self.slots,
        }
    }
}

fn validate_app(raw: RawApp, declared_hosts: &HashSet<String>) -> Result<AppSpec> {
    let name = AppName::new(raw.name).map_err(|e| ConfigError::InvalidAppName {
        reason: e.to_string(),
    })?;

    if raw.command.split_whitespace().next().is_none() {
        return Err(ConfigError::malformed(format!("app '{name}' has an empty command")));
    }

    let workers = u32::try_from(raw.workers).map_err(|_| {
        if raw.workers < 0 {
            ConfigError::NegativeWorkerCount {
                app: name.to_string(),
                count: raw.workers,
            }
        } else {
            ConfigError::malformed(format!(
                "app '{name}' worker count {} is too large",
                raw.workers
            ))
        }
    })?;

    if let Some(slot) = raw.slots.keys().find(|slot| **slot == 0 || **slot > workers) {
        return Err(ConfigError::SlotOutOfRange {
            app: name.to_string(),
            slot: *slot,
            workers,
        });
    }

    let hosts = raw
        .hosts
        .map(|hosts| {
            hosts
                .into_iter()
                .map(|host| {
                    if declared_hosts.contains(&host) {
                        Ok(Host::new(host))
                    } else {
                        Err(ConfigError::unknown_host(name.as_str(), host))
                    }
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    Ok(AppSpec {
        name,
        command: raw.command,
        version: raw.version,
        workers,
        hosts,
        args: raw.args,
        env: raw.env,
        slots: raw.slots,
    })
}

fn fingerprint<T: Serialize>(definition: &T) -> Result<Fingerprint> {
    Fingerprint::of(definition).map_err(|e| ConfigError::malformed(e.to_string()))
}

/// Non-empty, and free of characters the status-line grammar reserves.
fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '(' || c == ')')
}
