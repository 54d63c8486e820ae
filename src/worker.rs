//! Worker entry point: the process an agent launches for one slot.
//!
//! A worker finds its app from the spawn marker (delegating launcher) or the
//! config option's `#target` (direct launcher), looks the app up in the
//! cluster document, and replaces itself with the app's command.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use drover_core::AppName;
use drover_reconciler::ClusterConfig;
use drover_spawner::{AppSelector, Invocation, LauncherKind};
use tracing::info;

/// A worker start requested through the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub app: AppName,
    pub config_path: PathBuf,
    pub app_args: Vec<String>,
}

impl WorkerRequest {
    /// Recognize a worker invocation. `Ok(None)` means a regular CLI call.
    ///
    /// # Errors
    ///
    /// Fails for a worker invocation without a config option or with an
    /// invalid app name.
    pub fn from_invocation(invocation: &Invocation) -> Result<Option<Self>> {
        match invocation.kind {
            LauncherKind::Delegating => {
                let Some(target) = invocation.spawn_target() else {
                    return Ok(None);
                };
                let selector = AppSelector::find(&invocation.argv)
                    .with_context(|| format!("worker '{target}' was started without --config"))?;
                Ok(Some(Self {
                    app: AppName::new(target)?,
                    config_path: selector.path,
                    app_args: invocation.app_args().to_vec(),
                }))
            }
            LauncherKind::Direct => {
                let Some(selector) = AppSelector::find(&invocation.argv) else {
                    return Ok(None);
                };
                let Some(target) = selector.target.as_deref() else {
                    return Ok(None);
                };
                Ok(Some(Self {
                    app: AppName::new(target)?,
                    config_path: selector.path,
                    app_args: invocation.app_args().to_vec(),
                }))
            }
            LauncherKind::Unsupported => Ok(None),
        }
    }

    /// The argv this worker runs: the app's command split on whitespace,
    /// then the app arguments.
    ///
    /// # Errors
    ///
    /// Fails if the app is not declared or its command is blank.
    pub fn command(&self, config: &ClusterConfig) -> Result<Vec<String>> {
        let app = config.app(&self.app).with_context(|| {
            format!(
                "app '{}' is not declared in {}",
                self.app,
                self.config_path.display()
            )
        })?;

        let mut argv: Vec<String> = app.command.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            bail!("app '{}' has an empty command", self.app);
        }
        argv.extend(self.app_args.iter().cloned());
        Ok(argv)
    }
}

/// Load the cluster document and become the worker.
///
/// Only returns on failure.
///
/// # Errors
///
/// Fails if the document cannot be loaded, the app is unknown, or the
/// command cannot be executed.
pub fn run(request: &WorkerRequest) -> Result<()> {
    let config = ClusterConfig::from_file(&request.config_path).with_context(|| {
        format!(
            "Failed to load cluster document {}",
            request.config_path.display()
        )
    })?;
    let argv = request.command(&config)?;
    info!(app = %request.app, argv = ?argv, "Starting worker");
    exec(&argv)
}

#[cfg(unix)]
fn exec(argv: &[String]) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let (program, args) = argv.split_first().context("empty worker command")?;
    let error = std::process::Command::new(program).args(args).exec();
    Err(error).with_context(|| format!("Failed to execute '{program}'"))
}

#[cfg(not(unix))]
fn exec(argv: &[String]) -> Result<()> {
    let (program, args) = argv.split_first().context("empty worker command")?;
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to execute '{program}'"))?;
    std::process::exit(status.code().unwrap_or(1));
}
