#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # drover-spawner
//!
//! Turns one reconciliation decision into a concrete OS process launch.
//!
//! The launcher kind is resolved once at startup from the executable name
//! and carried in an [`Invocation`]:
//!
//! ```ignore
//! use drover_spawner::{Invocation, build_command, launch};
//!
//! let invocation = Invocation::current();
//! let argv = build_command("web", &["--port".into(), "8001".into()], &invocation)?;
//! let child = launch(&argv, &env)?;
//! ```

pub mod command;
pub mod error;
pub mod launcher;
pub mod process;

pub use command::build_command;
pub use error::{Error, Result};
pub use launcher::{
    APP_ARGS_SEPARATOR, AppSelector, DELEGATING_PROGRAM, DIRECT_PROGRAM, Invocation, LauncherKind,
    SPAWN_FLAG, split_app_args,
};
pub use process::{launch, stop};
