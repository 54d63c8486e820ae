//! The reconciliation engine.

use std::collections::BTreeMap;

use drover_core::{Host, WorkerKey};
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::cluster::ClusterConfig;
use crate::types::{
    DesiredState, KillOrder, KillReason, ObservedState, RunningInstance, StateSummary,
};

/// Desired vs. observed worker keys for every host.
///
/// Owned by one reconciliation loop for the lifetime of the agent process.
/// There is no internal locking: callers serialize access (a single loop,
/// or an external mutex when shared).
#[derive(Debug, Default)]
pub struct RunningState {
    desired: DesiredState,
    observed: ObservedState,
}

impl RunningState {
    /// Create an empty state: nothing desired, nothing running.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the desired state with the keys and fingerprints of `config`.
    ///
    /// Observed state is untouched. Hosts or apps that disappear show up as
    /// `kill_check` output, never as an error.
    pub fn update_config(&mut self, config: &ClusterConfig) {
        let mut desired = DesiredState::new();
        for host in config.hosts() {
            let keys: BTreeMap<_, _> = config
                .per_host_keys(host)
                .into_iter()
                .filter_map(|key| {
                    let fingerprint = config.slot_fingerprint(&key).cloned();
                    if fingerprint.is_none() {
                        warn!(host = %host, key = %key, "Desired key has no fingerprint, skipping");
                    }
                    fingerprint.map(|fp| (key, fp))
                })
                .collect();
            desired.hosts.insert(host.clone(), keys);
        }

        info!(
            hosts = desired.hosts.len(),
            desired = desired.len(),
            running = self.observed.len(),
            "Desired state updated"
        );
        self.desired = desired;
    }

    /// Keys desired on `host` that are not running there, sorted.
    ///
    /// An unknown host yields nothing.
    #[must_use]
    pub fn launch_check(&self, host: &Host) -> Vec<WorkerKey> {
        let Some(desired) = self.desired.on_host(host) else {
            return Vec::new();
        };
        let running = self.observed.hosts.get(host);
        desired
            .keys()
            .filter(|key| running.is_none_or(|r| !r.contains_key(*key)))
            .cloned()
            .collect()
    }

    /// Record `key` as running on `host`.
    ///
    /// Captures the key's current fingerprint. Reporting an instance that is
    /// already running keeps the fingerprint captured the first time.
    pub fn node_started(&mut self, host: &Host, key: &WorkerKey) {
        let fingerprint_at_start = self.desired.fingerprint(host, key).cloned();
        let running = self.observed.hosts.entry(host.clone()).or_default();
        if running.contains_key(key) {
            debug!(host = %host, key = %key, "Already running, keeping original fingerprint");
            return;
        }
        debug!(
            host = %host,
            key = %key,
            desired = fingerprint_at_start.is_some(),
            "Node started"
        );
        running.insert(
            key.clone(),
            RunningInstance {
                fingerprint_at_start,
                started_at: std::time::Instant::now(),
            },
        );
    }

    /// Forget `key` on `host`. Stopping a key that is not running is a no-op.
    pub fn node_stopped(&mut self, host: &Host, key: &WorkerKey) {
        let Some(running) = self.observed.hosts.get_mut(host) else {
            return;
        };
        if running.remove(key).is_some() {
            debug!(host = %host, key = %key, "Node stopped");
        }
        if running.is_empty() {
            self.observed.hosts.remove(host);
        }
    }

    /// Running `(host, key)` pairs that must be stopped, sorted.
    ///
    /// A pair is reported when its key is no longer desired on the host, or
    /// when the fingerprint captured at start differs from the key's current
    /// fingerprint.
    #[must_use]
    pub fn kill_check(&self) -> Vec<(Host, WorkerKey)> {
        self.kill_orders()
            .into_iter()
            .map(|order| (order.host, order.key))
            .collect()
    }

    /// Like [`RunningState::kill_check`], with the reason for each pair.
    #[must_use]
    pub fn kill_orders(&self) -> Vec<KillOrder> {
        self.observed
            .hosts
            .iter()
            .flat_map(|(host, running)| {
                running.iter().filter_map(move |(key, instance)| {
                    self.kill_reason(host, key, instance).map(|reason| KillOrder {
                        host: host.clone(),
                        key: key.clone(),
                        reason,
                    })
                })
            })
            .sorted_by(|a, b| (&a.host, &a.key).cmp(&(&b.host, &b.key)))
            .collect()
    }

    fn kill_reason(
        &self,
        host: &Host,
        key: &WorkerKey,
        instance: &RunningInstance,
    ) -> Option<KillReason> {
        match self.desired.fingerprint(host, key) {
            None => Some(KillReason::NotDesired),
            Some(current) if instance.fingerprint_at_start.as_ref() != Some(current) => {
                Some(KillReason::DefinitionChanged {
                    started: instance.fingerprint_at_start.clone(),
                    current: current.clone(),
                })
            }
            Some(_) => None,
        }
    }

    /// Instances running on `host`, ordered by key.
    #[must_use]
    pub fn running(&self, host: &Host) -> Vec<(&WorkerKey, &RunningInstance)> {
        self.observed
            .hosts
            .get(host)
            .map(|running| running.iter().collect())
            .unwrap_or_default()
    }

    /// Whether `key` is recorded as running on `host`.
    #[must_use]
    pub fn is_running(&self, host: &Host, key: &WorkerKey) -> bool {
        self.observed
            .hosts
            .get(host)
            .is_some_and(|running| running.contains_key(key))
    }

    /// Hosts with desired keys in the current document, sorted.
    #[must_use]
    pub fn desired_hosts(&self) -> Vec<&Host> {
        self.desired.hosts.keys().sorted().collect()
    }

    /// Counts of desired, running, and outstanding work.
    #[must_use]
    pub fn summary(&self) -> StateSummary {
        let pending_launch = self
            .desired
            .hosts
            .keys()
            .map(|host| self.launch_check(host).len())
            .sum();
        StateSummary {
            desired: self.desired.len(),
            running: self.observed.len(),
            pending_launch,
            pending_kill: self.kill_orders().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::AppName;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const CONFIG: &str = r#"
hosts: [node1, node2]
apps:
  - name: web
    command: "run-web"
    version: "1"
    workers: 2
  - name: cron
    command: "run-cron"
    workers: 1
    hosts: [node2]
"#;

    fn key(app: &str, slot: u32) -> std::result::Result<WorkerKey, drover_core::Error> {
        Ok(WorkerKey::new(AppName::new(app)?, slot))
    }

    fn start_everything(state: &mut RunningState, config: &ClusterConfig) {
        for host in config.hosts() {
            for k in state.launch_check(host) {
                state.node_started(host, &k);
            }
        }
    }

    #[test]
    fn test_launch_check_matches_per_host_keys() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);

        for host in config.hosts() {
            let launched: Vec<_> = state.launch_check(host);
            let expected: Vec<_> = config.per_host_keys(host).into_iter().collect();
            assert_eq!(launched, expected);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_host_is_empty() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);

        assert!(state.launch_check(&Host::from("elsewhere")).is_empty());
        assert!(state.running(&Host::from("elsewhere")).is_empty());
        Ok(())
    }

    #[test]
    fn test_start_stop_round_trip() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        let host = Host::from("node1");
        let before = state.launch_check(&host);

        let web1 = key("web", 1)?;
        state.node_started(&host, &web1);
        assert!(state.is_running(&host, &web1));
        assert_eq!(state.launch_check(&host).len(), before.len().saturating_sub(1));

        state.node_stopped(&host, &web1);
        assert_eq!(state.launch_check(&host), before);
        Ok(())
    }

    #[test]
    fn test_node_stopped_is_idempotent() -> TestResult {
        let mut state = RunningState::new();
        let host = Host::from("node1");
        state.node_stopped(&host, &key("web", 1)?);
        state.node_stopped(&host, &key("web", 1)?);
        assert!(state.running(&host).is_empty());
        Ok(())
    }

    #[test]
    fn test_kill_check_empty_when_converged() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        start_everything(&mut state, &config);

        assert!(state.kill_check().is_empty());
        assert!(state.summary().converged());
        assert_eq!(state.summary().running, 5);
        Ok(())
    }

    #[test]
    fn test_update_config_never_touches_observed() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        start_everything(&mut state, &config);

        let empty = ClusterConfig::from_yaml_str("hosts: []\n")?;
        state.update_config(&empty);

        assert_eq!(state.summary().running, 5);
        assert_eq!(state.kill_check().len(), 5);
        assert!(state.desired_hosts().is_empty());
        Ok(())
    }

    #[test]
    fn test_shrinking_worker_count_kills_extra_slots() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        start_everything(&mut state, &config);

        let shrunk = ClusterConfig::from_yaml_str(&CONFIG.replace("workers: 2", "workers: 1"))?;
        state.update_config(&shrunk);

        let web2 = key("web", 2)?;
        let kills = state.kill_orders();
        assert_eq!(kills.len(), 2);
        assert!(kills.iter().all(|o| o.key == web2));
        assert!(kills.iter().all(|o| o.reason == KillReason::NotDesired));
        Ok(())
    }

    #[test]
    fn test_definition_change_forces_restart() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        start_everything(&mut state, &config);

        let bumped = ClusterConfig::from_yaml_str(&CONFIG.replace("version: \"1\"", "version: \"2\""))?;
        state.update_config(&bumped);

        let kills = state.kill_check();
        assert_eq!(kills.len(), 4);
        assert!(state.launch_check(&Host::from("node1")).is_empty());

        for (host, k) in &kills {
            state.node_stopped(host, k);
        }
        assert_eq!(state.launch_check(&Host::from("node1")).len(), 2);
        for host in bumped.hosts() {
            for k in state.launch_check(host) {
                state.node_started(host, &k);
            }
        }
        assert!(state.kill_check().is_empty());
        Ok(())
    }

    #[test]
    fn test_fingerprint_at_start_is_immutable() -> TestResult {
        let config = ClusterConfig::from_yaml_str(CONFIG)?;
        let mut state = RunningState::new();
        state.update_config(&config);
        let host = Host::from("node1");
        let web1 = key("web", 1)?;
        state.node_started(&host, &web1);

        let bumped = ClusterConfig::from_yaml_str(&CONFIG.replace("version: \"1\"", "version: \"2\""))?;
        state.update_config(&bumped);
        state.node_started(&host, &web1);

        assert_eq!(state.kill_check(), vec![(host, web1)]);
        Ok(())
    }

    #[test]
    fn test_started_while_undesired_is_killed() -> TestResult {
        let mut state = RunningState::new();
        let host = Host::from("node1");
        let stray = key("stray", 1)?;
        state.node_started(&host, &stray);

        let orders = state.kill_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders.first().map(|o| &o.reason), Some(&KillReason::NotDesired));
        assert!(orders.iter().all(|o| o.description().contains("stray-1")));
        Ok(())
    }
}
