//! The per-host reconciliation loop.
//!
//! Each tick reloads the cluster document, stops this host's workers that
//! are no longer wanted or whose definition changed, notices workers that
//! exited on their own, and launches whatever is missing. Status lines are
//! pushed to the master after every tick when one is configured.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use drover_control::{ControlClient, format_duration};
use drover_core::{Host, ResultExt, WorkerKey};
use drover_reconciler::{ClusterConfig, RunningState};
use drover_spawner::{Invocation, build_command};
use tokio::process::Child;
use tracing::{debug, error, info, warn};

/// Environment variable carrying the app name into a worker.
pub const APP_ENV: &str = "DROVER_APP";
/// Environment variable carrying the slot index into a worker.
pub const SLOT_ENV: &str = "DROVER_SLOT";
/// Environment variable carrying the host name into a worker.
pub const HOST_ENV: &str = "DROVER_HOST";

/// Segments shown in a status line uptime.
const UPTIME_COMPONENTS: usize = 2;

/// The OS processes an agent owns, keyed by worker.
pub trait WorkerProcesses {
    /// Start a worker and return its pid.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    fn start(
        &mut self,
        key: &WorkerKey,
        argv: &[String],
        env: &BTreeMap<String, String>,
    ) -> drover_spawner::Result<u32>;

    /// Stop a worker. Stopping an unknown key is a no-op. A worker that
    /// fails to stop stays tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be stopped.
    fn stop(&mut self, key: &WorkerKey) -> impl Future<Output = drover_spawner::Result<()>> + Send;

    /// Workers whose process exited since the last call.
    fn reap(&mut self) -> Vec<WorkerKey>;

    /// Pid of a running worker.
    fn pid(&self, key: &WorkerKey) -> Option<u32>;
}

/// Real child processes.
#[derive(Debug, Default)]
pub struct ChildTable {
    children: HashMap<WorkerKey, Child>,
}

impl WorkerProcesses for ChildTable {
    fn start(
        &mut self,
        key: &WorkerKey,
        argv: &[String],
        env: &BTreeMap<String, String>,
    ) -> drover_spawner::Result<u32> {
        let child = drover_spawner::launch(argv, env)?;
        let pid = child.id().unwrap_or_default();
        self.children.insert(key.clone(), child);
        Ok(pid)
    }

    async fn stop(&mut self, key: &WorkerKey) -> drover_spawner::Result<()> {
        let Some(child) = self.children.get_mut(key) else {
            return Ok(());
        };
        drover_spawner::stop(child).await?;
        self.children.remove(key);
        Ok(())
    }

    fn reap(&mut self) -> Vec<WorkerKey> {
        let exited: Vec<WorkerKey> = self
            .children
            .iter_mut()
            .filter_map(|(key, child)| match child.try_wait() {
                Ok(Some(status)) => {
                    info!(worker = %key, status = %status, "Worker exited");
                    Some(key.clone())
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(worker = %key, error = %e, "Could not poll worker");
                    None
                }
            })
            .collect();

        for key in &exited {
            self.children.remove(key);
        }
        exited
    }

    fn pid(&self, key: &WorkerKey) -> Option<u32> {
        self.children.get(key).and_then(Child::id)
    }
}

/// Agent settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub config_path: PathBuf,
    pub host: Host,
    pub interval: Duration,
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub stopped: usize,
    pub exited: usize,
    pub launched: usize,
    pub failed: usize,
}

/// Reconciles one host against the cluster document.
pub struct Agent<P: WorkerProcesses> {
    settings: AgentSettings,
    invocation: Invocation,
    config: Arc<ClusterConfig>,
    state: RunningState,
    processes: P,
    control: Option<ControlClient>,
}

impl<P: WorkerProcesses> Agent<P> {
    /// Create an agent. The document must load; later reload failures keep
    /// the last good one.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster document cannot be loaded.
    pub fn new(
        settings: AgentSettings,
        invocation: Invocation,
        processes: P,
        control: Option<ControlClient>,
    ) -> Result<Self> {
        let config = ClusterConfig::from_file(&settings.config_path).with_context(|| {
            format!(
                "Failed to load cluster document {}",
                settings.config_path.display()
            )
        })?;

        Ok(Self {
            settings,
            invocation,
            config: Arc::new(config),
            state: RunningState::new(),
            processes,
            control,
        })
    }

    /// Reconciliation state.
    #[must_use]
    pub const fn state(&self) -> &RunningState {
        &self.state
    }

    /// Run one reconciliation pass.
    pub async fn tick(&mut self) -> TickReport {
        let config = self.reload_config();
        self.state.update_config(&config);

        let mut report = TickReport::default();
        let host = self.settings.host.clone();

        for order in self.state.kill_orders() {
            if order.host != host {
                continue;
            }
            match self.processes.stop(&order.key).await {
                Ok(()) => {
                    info!(worker = %order.key, reason = %order.reason, "Stopped worker");
                    self.state.node_stopped(&host, &order.key);
                    report.stopped = report.stopped.saturating_add(1);
                }
                Err(e) => {
                    error!(worker = %order.key, error = %e, "Failed to stop worker");
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        for key in self.processes.reap() {
            self.state.node_stopped(&host, &key);
            report.exited = report.exited.saturating_add(1);
        }

        for key in self.state.launch_check(&host) {
            match self.launch(&config, &key) {
                Ok(pid) => {
                    info!(worker = %key, pid, "Launched worker");
                    self.state.node_started(&host, &key);
                    report.launched = report.launched.saturating_add(1);
                }
                Err(e) => {
                    error!(worker = %key, error = %e, "Failed to launch worker");
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        debug!(host = %host, report = ?report, "Tick complete");
        report
    }

    /// Status lines for every worker this agent has running.
    #[must_use]
    pub fn status_lines(&self) -> Vec<String> {
        let host = &self.settings.host;
        self.state
            .running(host)
            .into_iter()
            .filter_map(|(key, instance)| {
                let pid = self.processes.pid(key)?;
                Some(format!(
                    "{}.{} ({host}:{pid}) slot {} up {}",
                    self.config.namespace(),
                    key.app,
                    key.slot,
                    format_duration(instance.uptime().as_secs(), UPTIME_COMPONENTS)
                ))
            })
            .collect()
    }

    /// Push status lines to the master, if one is configured.
    ///
    /// Failures are logged; the loop carries on.
    pub async fn push_status(&self) {
        let Some(client) = &self.control else {
            return;
        };
        let lines = self.status_lines();
        client
            .report_status(&self.settings.host, &lines)
            .await
            .into_option_logged("status report");
    }

    /// Tick on the configured interval until Ctrl+C, then stop every worker.
    pub async fn run(mut self) {
        info!(
            host = %self.settings.host,
            interval_secs = self.settings.interval.as_secs(),
            "Agent running. Press Ctrl+C to stop."
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                    self.push_status().await;
                }
                result = &mut shutdown => {
                    match result {
                        Ok(()) => info!("Received Ctrl+C, stopping workers"),
                        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
                    }
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Stop every worker this agent started.
    pub async fn shutdown(&mut self) {
        let host = self.settings.host.clone();
        let keys: Vec<WorkerKey> = self
            .state
            .running(&host)
            .into_iter()
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys {
            match self.processes.stop(&key).await {
                Ok(()) => self.state.node_stopped(&host, &key),
                Err(e) => error!(worker = %key, error = %e, "Failed to stop worker"),
            }
        }
        info!(host = %host, "Agent stopped");
    }

    fn reload_config(&mut self) -> Arc<ClusterConfig> {
        match ClusterConfig::from_file(&self.settings.config_path) {
            Ok(config) => self.config = Arc::new(config),
            Err(e) => warn!(
                path = %self.settings.config_path.display(),
                error = %e,
                "Keeping last good cluster document"
            ),
        }
        Arc::clone(&self.config)
    }

    fn launch(&mut self, config: &ClusterConfig, key: &WorkerKey) -> Result<u32> {
        let args = config.slot_args(key).unwrap_or_default();
        let argv = build_command(key.app.as_str(), &args, &self.invocation)?;
        let env = worker_env(config, key, &self.settings.host);
        Ok(self.processes.start(key, &argv, &env)?)
    }
}

/// Environment handed to a worker: the slot's env plus its identity.
#[must_use]
pub fn worker_env(config: &ClusterConfig, key: &WorkerKey, host: &Host) -> BTreeMap<String, String> {
    let mut env = config.slot_env(key).unwrap_or_default();
    env.insert(APP_ENV.to_string(), key.app.to_string());
    env.insert(SLOT_ENV.to_string(), key.slot.to_string());
    env.insert(HOST_ENV.to_string(), host.to_string());
    env
}
