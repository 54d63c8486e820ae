#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # drover
//!
//! Desired-state process reconciliation across a fleet of hosts.
//!
//! The same entry point serves the operator CLI, the per-host agent, and the
//! workers the agent launches: a worker invocation carries a spawn marker
//! (`drover --spawn=<app> ...`) or a `#target` on its config option
//! (`drover-serve --config <doc>#<app> ...`) and never reaches clap.

pub mod agent;
pub mod cli;
pub mod commands;
pub mod worker;

use anyhow::Result;
use clap::Parser;
use drover_spawner::{Invocation, split_app_args};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::commands::execute_command;
use crate::worker::WorkerRequest;

/// Shared `main` of the `drover` and `drover-serve` executables.
///
/// # Errors
///
/// Returns whatever the selected command or worker start fails with.
pub async fn run() -> Result<()> {
    init_tracing();

    let invocation = Invocation::current();
    if let Some(request) = WorkerRequest::from_invocation(&invocation)? {
        return worker::run(&request);
    }

    let (launcher_args, _) = split_app_args(&invocation.argv);
    let cli = Cli::parse_from(launcher_args);
    execute_command(cli.command, invocation).await
}

/// Initialize tracing subscriber with environment filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
