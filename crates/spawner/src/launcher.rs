//! Which launcher is running, and how its argv is laid out.
//!
//! argv protocol: `<prog> [--spawn=<entry_point>] <base-args> [! <app-args>]`.

use std::fmt;
use std::path::{Path, PathBuf};

/// Flag that tells a delegating launcher which entry point to run.
pub const SPAWN_FLAG: &str = "--spawn";

/// Separates launcher arguments from application arguments.
pub const APP_ARGS_SEPARATOR: &str = "!";

/// Executable name of the delegating launcher.
pub const DELEGATING_PROGRAM: &str = "drover";

/// Executable name of the direct launcher.
pub const DIRECT_PROGRAM: &str = "drover-serve";

/// How the current executable spawns children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherKind {
    /// Children select their app through the config option's `#target`.
    Direct,
    /// Children re-invoke the same executable with `--spawn=<entry_point>`.
    Delegating,
    /// Anything else; spawning is refused.
    Unsupported,
}

impl LauncherKind {
    /// Classify an executable by its file name.
    #[must_use]
    pub fn detect(program: &str) -> Self {
        let stem = Path::new(program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match stem {
            DELEGATING_PROGRAM => Self::Delegating,
            DIRECT_PROGRAM => Self::Direct,
            _ => Self::Unsupported,
        }
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Delegating => write!(f, "delegating"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// The argv this process was started with, and the launcher kind it implies.
///
/// Captured once at startup and passed to every `build_command` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: LauncherKind,
    pub argv: Vec<String>,
}

impl Invocation {
    /// Wrap an argv, classifying it by its program name.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        let kind = argv
            .first()
            .map_or(LauncherKind::Unsupported, |program| LauncherKind::detect(program));
        Self { kind, argv }
    }

    /// The current process's invocation.
    #[must_use]
    pub fn current() -> Self {
        Self::new(std::env::args().collect())
    }

    /// Program name (`argv[0]`), or an empty string for an empty argv.
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Entry point named by a spawn marker, if this is a spawned child.
    #[must_use]
    pub fn spawn_target(&self) -> Option<&str> {
        let (launcher_args, _) = split_app_args(&self.argv);
        let mut tokens = launcher_args.iter().skip(1);
        while let Some(token) = tokens.next() {
            if token == SPAWN_FLAG {
                return tokens.next().map(String::as_str);
            }
            if let Some(value) = token.strip_prefix(SPAWN_FLAG).and_then(|r| r.strip_prefix('=')) {
                return Some(value);
            }
        }
        None
    }

    /// Launcher arguments with every spawn marker removed.
    #[must_use]
    pub fn without_spawn_markers(&self) -> Vec<String> {
        let (launcher_args, _) = split_app_args(&self.argv);
        strip_spawn_markers(launcher_args)
    }

    /// Arguments after the `!` separator.
    #[must_use]
    pub fn app_args(&self) -> &[String] {
        split_app_args(&self.argv).1
    }
}

/// Split an argv at the first `!`: launcher arguments, then app arguments.
#[must_use]
pub fn split_app_args(argv: &[String]) -> (&[String], &[String]) {
    match argv.iter().position(|arg| arg == APP_ARGS_SEPARATOR) {
        Some(index) => {
            let (launcher, rest) = argv.split_at(index);
            (launcher, rest.get(1..).unwrap_or_default())
        }
        None => {
            let empty: &[String] = &[];
            (argv, empty)
        }
    }
}

/// Drop `--spawn=<x>` and `--spawn <x>` tokens.
pub(crate) fn strip_spawn_markers(args: &[String]) -> Vec<String> {
    let mut stripped = Vec::with_capacity(args.len());
    let mut tokens = args.iter();
    while let Some(token) = tokens.next() {
        if token == SPAWN_FLAG {
            tokens.next();
            continue;
        }
        if token.starts_with(&format!("{SPAWN_FLAG}=")) {
            continue;
        }
        stripped.push(token.clone());
    }
    stripped
}

/// The config option of a direct-mode invocation: `--config <path>[#target]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSelector {
    pub path: PathBuf,
    pub target: Option<String>,
    /// Index of the token holding the value.
    pub(crate) value_index: usize,
    /// Whether the value is inline (`--config=<value>`).
    pub(crate) inline: bool,
}

impl AppSelector {
    /// Locate the config option in an argv.
    #[must_use]
    pub fn find(argv: &[String]) -> Option<Self> {
        let (launcher_args, _) = split_app_args(argv);
        for (index, token) in launcher_args.iter().enumerate().skip(1) {
            if token == "--config" || token == "-c" {
                let value_index = index.checked_add(1)?;
                let value = launcher_args.get(value_index)?;
                return Some(Self::parse(value, value_index, false));
            }
            if let Some(value) = token.strip_prefix("--config=") {
                return Some(Self::parse(value, index, true));
            }
        }
        None
    }

    fn parse(value: &str, value_index: usize, inline: bool) -> Self {
        let (path, target) = match value.split_once('#') {
            Some((path, target)) if !target.is_empty() => (path, Some(target.to_string())),
            Some((path, _)) => (path, None),
            None => (value, None),
        };
        Self {
            path: PathBuf::from(path),
            target,
            value_index,
            inline,
        }
    }

    /// Render the option value pointing at `target`.
    pub(crate) fn retargeted(&self, target: &str) -> String {
        let value = format!("{}#{target}", self.path.display());
        if self.inline {
            format!("--config={value}")
        } else {
            value
        }
    }
}
