//! Building the argv of a worker process.

use drover_core::NAMESPACE_SEPARATOR;
use tracing::debug;

use crate::error::{Error, Result};
use crate::launcher::{
    APP_ARGS_SEPARATOR, AppSelector, Invocation, LauncherKind, SPAWN_FLAG, split_app_args,
    strip_spawn_markers,
};

/// Build the argv that starts `entry_point` the way the current launcher would.
///
/// The current invocation is copied and every spawn marker already in it is
/// dropped, so chained spawns never accumulate markers. Then:
///
/// - **Delegating**: `--spawn=<entry_point>` goes right after the program
///   name, the parent's own `! <app-args>` tail is dropped, and `extra_args`
///   follow a fresh `!` when non-empty.
/// - **Direct**: the config option's `#target` is replaced with
///   `entry_point`, the parent's `! <app-args>` tail is dropped, and
///   `extra_args` follow a fresh `!` when non-empty.
///
/// Launching the result is the caller's job.
///
/// # Errors
///
/// - [`Error::InvalidEntryPoint`] if `entry_point` is empty or contains the
///   namespace separator.
/// - [`Error::UnsupportedLauncher`] if the invocation's launcher kind is
///   [`LauncherKind::Unsupported`].
/// - [`Error::MissingAppSelector`] for a direct invocation without `--config`.
pub fn build_command(
    entry_point: &str,
    extra_args: &[String],
    invocation: &Invocation,
) -> Result<Vec<String>> {
    validate_entry_point(entry_point)?;

    let argv = match invocation.kind {
        LauncherKind::Delegating => delegating_command(entry_point, extra_args, &invocation.argv),
        LauncherKind::Direct => direct_command(entry_point, extra_args, &invocation.argv)?,
        LauncherKind::Unsupported => {
            return Err(Error::unsupported_launcher(invocation.program()));
        }
    };

    debug!(entry_point, kind = %invocation.kind, argv = ?argv, "Built worker command");
    Ok(argv)
}

fn validate_entry_point(entry_point: &str) -> Result<()> {
    if entry_point.is_empty() {
        return Err(Error::invalid_entry_point(entry_point, "entry point is empty"));
    }
    if entry_point.contains(NAMESPACE_SEPARATOR) {
        return Err(Error::invalid_entry_point(
            entry_point,
            format!("contains namespace separator '{NAMESPACE_SEPARATOR}'"),
        ));
    }
    if entry_point.chars().any(char::is_whitespace) || entry_point == APP_ARGS_SEPARATOR {
        return Err(Error::invalid_entry_point(entry_point, "not a single token"));
    }
    Ok(())
}

fn delegating_command(entry_point: &str, extra_args: &[String], argv: &[String]) -> Vec<String> {
    // The parent's app args belong to the parent.
    let (launcher_args, _) = split_app_args(argv);
    let base = strip_spawn_markers(launcher_args);

    let mut command = Vec::with_capacity(base.len().saturating_add(extra_args.len()).saturating_add(2));
    let mut tokens = base.into_iter();
    if let Some(program) = tokens.next() {
        command.push(program);
    }
    command.push(format!("{SPAWN_FLAG}={entry_point}"));
    command.extend(tokens);

    if !extra_args.is_empty() {
        command.push(APP_ARGS_SEPARATOR.to_string());
        command.extend(extra_args.iter().cloned());
    }
    command
}

fn direct_command(entry_point: &str, extra_args: &[String], argv: &[String]) -> Result<Vec<String>> {
    let (launcher_args, _) = split_app_args(argv);
    let base = strip_spawn_markers(launcher_args);
    let selector = AppSelector::find(&base).ok_or(Error::MissingAppSelector)?;

    let mut command: Vec<String> = base
        .into_iter()
        .enumerate()
        .map(|(index, token)| {
            if index == selector.value_index {
                selector.retargeted(entry_point)
            } else {
                token
            }
        })
        .collect();

    if !extra_args.is_empty() {
        command.push(APP_ARGS_SEPARATOR.to_string());
        command.extend(extra_args.iter().cloned());
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_string()).collect()
    }

    fn marker_count(command: &[String]) -> usize {
        command
            .iter()
            .filter(|t| *t == SPAWN_FLAG || t.starts_with("--spawn="))
            .count()
    }

    #[test]
    fn test_delegating_inserts_marker_after_program() -> Result<()> {
        let invocation = Invocation::new(argv(&["drover", "agent", "--config", "c.yaml"]));
        let command = build_command("web", &[], &invocation)?;
        assert_eq!(command, argv(&["drover", "--spawn=web", "agent", "--config", "c.yaml"]));
        Ok(())
    }

    #[test]
    fn test_delegating_drops_parent_app_args() -> Result<()> {
        let invocation = Invocation::new(argv(&["drover", "agent", "!", "--parent-only"]));
        let command = build_command("web", &argv(&["--port", "8001"]), &invocation)?;
        assert_eq!(
            command,
            argv(&["drover", "--spawn=web", "agent", "!", "--port", "8001"])
        );
        Ok(())
    }

    #[test]
    fn test_delegating_no_separator_without_extra_args() -> Result<()> {
        let invocation = Invocation::new(argv(&["drover", "agent", "!", "--parent-only"]));
        let command = build_command("web", &[], &invocation)?;
        assert!(!command.iter().any(|t| t == APP_ARGS_SEPARATOR));
        Ok(())
    }

    #[test]
    fn test_chained_spawns_keep_one_marker() -> Result<()> {
        let mut invocation = Invocation::new(argv(&["drover", "agent", "--config", "c.yaml"]));
        for entry in ["web", "cron", "web", "mailer"] {
            let command = build_command(entry, &argv(&["--slot", "1"]), &invocation)?;
            assert_eq!(marker_count(&command), 1);
            invocation = Invocation::new(command);
        }
        assert_eq!(invocation.spawn_target(), Some("mailer"));
        Ok(())
    }

    #[test]
    fn test_split_marker_form_is_stripped() -> Result<()> {
        let invocation = Invocation::new(argv(&["drover", "--spawn", "old", "agent"]));
        let command = build_command("web", &[], &invocation)?;
        assert_eq!(command, argv(&["drover", "--spawn=web", "agent"]));
        Ok(())
    }

    #[test]
    fn test_direct_retargets_selector() -> Result<()> {
        let invocation = Invocation::new(argv(&[
            "drover-serve",
            "agent",
            "--config",
            "c.yaml#web",
            "--host",
            "n1",
        ]));
        let command = build_command("cron", &argv(&["--nightly"]), &invocation)?;
        assert_eq!(
            command,
            argv(&["drover-serve", "agent", "--config", "c.yaml#cron", "--host", "n1", "!", "--nightly"])
        );
        Ok(())
    }

    #[test]
    fn test_direct_drops_parent_app_args() -> Result<()> {
        let invocation = Invocation::new(argv(&[
            "drover-serve",
            "agent",
            "--config",
            "c.yaml#web",
            "!",
            "--parent-only",
        ]));
        let command = build_command("cron", &[], &invocation)?;
        assert_eq!(command, argv(&["drover-serve", "agent", "--config", "c.yaml#cron"]));
        Ok(())
    }

    #[test]
    fn test_direct_inline_selector_without_target() -> Result<()> {
        let invocation = Invocation::new(argv(&["drover-serve", "--config=c.yaml"]));
        let command = build_command("web", &[], &invocation)?;
        assert_eq!(command, argv(&["drover-serve", "--config=c.yaml#web"]));
        Ok(())
    }

    #[test]
    fn test_direct_without_selector_fails() {
        let invocation = Invocation::new(argv(&["drover-serve", "agent"]));
        let result = build_command("web", &[], &invocation);
        assert!(matches!(result, Err(Error::MissingAppSelector)));
    }

    #[test]
    fn test_namespaced_entry_point_rejected() {
        let invocation = Invocation::new(argv(&["drover", "agent"]));
        assert!(matches!(
            build_command("shop.web", &[], &invocation),
            Err(Error::InvalidEntryPoint { .. })
        ));
        assert!(matches!(
            build_command("", &[], &invocation),
            Err(Error::InvalidEntryPoint { .. })
        ));
    }

    #[test]
    fn test_unsupported_launcher_rejected() {
        let invocation = Invocation::new(argv(&["python3", "-m", "drover"]));
        let result = build_command("web", &[], &invocation);
        assert!(matches!(result, Err(Error::UnsupportedLauncher { program }) if program == "python3"));
    }
}
