//! CLI command handlers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use drover_control::{ControlClient, ControlConfig};
use drover_core::Host;
use drover_reconciler::ClusterConfig;
use drover_spawner::Invocation;
use tracing::info;
use url::Url;

use crate::agent::{Agent, AgentSettings, ChildTable};
use crate::cli::Commands;

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(command: Commands, invocation: Invocation) -> Result<()> {
    match command {
        Commands::Agent {
            config,
            host,
            interval,
            master,
        } => cmd_agent(config, host, interval, master, invocation).await,

        Commands::Check { config, host } => cmd_check(&config, host.as_deref()),

        Commands::Control {
            command,
            file,
            master,
            credentials,
        } => cmd_control(&command, file.as_deref(), master, credentials).await,

        Commands::Status {
            path,
            master,
            credentials,
        } => cmd_status(&path, master, credentials).await,
    }
}

/// Run the reconciliation loop.
async fn cmd_agent(
    config_path: PathBuf,
    host: Option<String>,
    interval: u64,
    master: Option<Url>,
    invocation: Invocation,
) -> Result<()> {
    if interval == 0 {
        bail!("--interval must be at least 1 second");
    }

    let host = host.map_or_else(local_host_name, Host::new);
    let control = if master.is_some() {
        Some(ControlClient::with_config(control_config(master, None))?)
    } else {
        info!("No master configured, status reporting disabled");
        None
    };

    let settings = AgentSettings {
        config_path,
        host,
        interval: Duration::from_secs(interval),
    };
    let agent = Agent::new(settings, invocation, ChildTable::default(), control)?;
    agent.run().await;
    Ok(())
}

/// Validate a cluster document and print its workers per host.
fn cmd_check(config_path: &Path, host: Option<&str>) -> Result<()> {
    let config = ClusterConfig::from_file(config_path)
        .with_context(|| format!("Invalid cluster document {}", config_path.display()))?;

    let hosts: Vec<Host> = match host {
        Some(name) => vec![Host::new(name)],
        None => config.hosts().to_vec(),
    };

    println!("namespace: {}", config.namespace());
    for host in &hosts {
        let keys = config.per_host_keys(host);
        println!("{host}: {} worker(s)", keys.len());
        for key in &keys {
            let fingerprint = config
                .slot_fingerprint(key)
                .map_or("-", drover_core::Fingerprint::short);
            println!("  {key}  {fingerprint}");
        }
    }
    Ok(())
}

/// Fan a command out to the nodes named in status lines.
async fn cmd_control(
    command: &str,
    file: Option<&Path>,
    master: Option<Url>,
    credentials: Option<PathBuf>,
) -> Result<()> {
    let input = match file {
        Some(path) => drover_core::fs::read_file(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read status lines from stdin")?;
            buffer
        }
    };

    let client = ControlClient::with_config(control_config(master, credentials))?;
    let outcome = client
        .bulk_control(input.lines(), command)
        .await
        .with_context(|| format!("Bulk command '{command}' failed"))?;

    for rejected in &outcome.rejected {
        eprintln!("rejected: {rejected}");
    }
    if outcome.sent {
        println!("'{command}' sent for {} node(s)", outcome.accepted);
    } else {
        println!("No valid status lines, nothing sent");
    }
    Ok(())
}

/// Print a JSON document from the master.
async fn cmd_status(path: &str, master: Option<Url>, credentials: Option<PathBuf>) -> Result<()> {
    let client = ControlClient::with_config(control_config(master, credentials))?;
    let value: serde_json::Value = client
        .get_json(path)
        .await
        .with_context(|| format!("Failed to fetch '{path}'"))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Environment configuration with command-line overrides on top.
fn control_config(master: Option<Url>, credentials: Option<PathBuf>) -> ControlConfig {
    let mut config = ControlConfig::from_env();
    if let Some(url) = master {
        config.base_url = Some(url);
    }
    if let Some(path) = credentials {
        config = config.credentials(path);
    }
    config
}

fn local_host_name() -> Host {
    drover_core::fs::read_optional_file(Path::new("/etc/hostname"))
        .ok()
        .flatten()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map_or_else(|| Host::new("localhost"), Host::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_check_valid_document() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "hosts: [n1]\napps:\n  - name: web\n    command: /usr/bin/web\n")?;
        cmd_check(file.path(), None)?;
        cmd_check(file.path(), Some("elsewhere"))?;
        Ok(())
    }

    #[test]
    fn test_check_invalid_document() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "hosts: [n1]\napps:\n  - name: web\n    command: x\n    workers: -1\n")?;
        assert!(cmd_check(file.path(), None).is_err());
        Ok(())
    }

    #[test]
    fn test_control_config_overrides() -> Result<()> {
        let config = control_config(
            Some("http://master:9000/".parse()?),
            Some(PathBuf::from("/tmp/creds.toml")),
        );
        assert_eq!(config.base_url.as_ref().map(Url::as_str), Some("http://master:9000/"));
        assert_eq!(config.credentials_path, Some(PathBuf::from("/tmp/creds.toml")));
        Ok(())
    }

    #[test]
    fn test_local_host_name_is_never_empty() {
        assert!(!local_host_name().as_str().is_empty());
    }
}
