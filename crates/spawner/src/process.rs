//! Starting and stopping worker processes.

use std::collections::BTreeMap;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Start `argv` as a child process and return without waiting for it.
///
/// stdin is closed; stdout and stderr are inherited. The caller owns the
/// returned [`Child`] and must stop or reap it. Must be called from within
/// a tokio runtime.
///
/// # Errors
///
/// Returns [`Error::LaunchFailed`] for an empty argv or when the OS refuses
/// to start the program.
pub fn launch(argv: &[String], env: &BTreeMap<String, String>) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::launch_failed("", "empty argv"))?;

    let child = Command::new(program)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| Error::launch_failed(program, e.to_string()))?;

    info!(program = %program, pid = ?child.id(), "Launched worker");
    Ok(child)
}

/// Kill a child and reap it. A child that already exited is just reaped.
///
/// # Errors
///
/// Returns [`Error::StopFailed`] if the child cannot be polled, signalled
/// or waited on. The child is left in place so the caller can retry.
pub async fn stop(child: &mut Child) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    match child
        .try_wait()
        .map_err(|e| Error::stop_failed(pid, e.to_string()))?
    {
        Some(status) => debug!(pid, status = %status, "Worker had already exited"),
        None => {
            child
                .kill()
                .await
                .map_err(|e| Error::stop_failed(pid, e.to_string()))?;
            debug!(pid, "Worker stopped");
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_string()).collect()
    }

    #[tokio::test]
    async fn test_launch_empty_argv_fails() {
        let result = launch(&[], &BTreeMap::new());
        assert!(matches!(result, Err(Error::LaunchFailed { .. })));
    }

    #[tokio::test]
    async fn test_launch_missing_program_fails() {
        let result = launch(&argv(&["/nonexistent/drover-worker"]), &BTreeMap::new());
        assert!(matches!(result, Err(Error::LaunchFailed { .. })));
    }

    #[tokio::test]
    async fn test_launch_and_stop() -> Result<()> {
        let mut child = launch(&argv(&["sleep", "30"]), &BTreeMap::new())?;
        assert!(matches!(child.try_wait(), Ok(None)));
        stop(&mut child).await?;
        assert!(child.id().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_exited_child() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut child = launch(&argv(&["true"]), &BTreeMap::new())?;
        child.wait().await?;
        stop(&mut child).await?;
        stop(&mut child).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_launch_passes_env() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut env = BTreeMap::new();
        env.insert("DROVER_SLOT".to_string(), "3".to_string());
        let mut child = launch(&argv(&["sh", "-c", "test \"$DROVER_SLOT\" = 3"]), &env)?;
        let status = child.wait().await?;
        assert!(status.success());
        Ok(())
    }
}
