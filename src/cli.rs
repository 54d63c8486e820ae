//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

/// Drover - desired-state process reconciliation
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(version)]
#[command(about = "Keep every host running exactly the workers its cluster document declares")]
#[command(
    long_about = "Drover runs one agent per host. Each agent diffs the cluster document against the workers it started, stops what changed or is no longer wanted, and launches what is missing. Workers are re-invocations of this binary with --spawn=<app>."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reconciliation loop for this host
    Agent {
        /// Cluster document (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Host name to reconcile (defaults to this machine's name)
        #[arg(long, env = "DROVER_HOST")]
        host: Option<String>,

        /// Seconds between reconciliation passes
        #[arg(short, long, default_value_t = 5)]
        interval: u64,

        /// Master base URL for status reporting
        #[arg(long, env = "DROVER_MASTER_URL")]
        master: Option<Url>,
    },

    /// Validate a cluster document and show the workers it declares
    Check {
        /// Cluster document (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Only show this host
        #[arg(long)]
        host: Option<String>,
    },

    /// Send a bulk command for the nodes named in status lines
    Control {
        /// Master command path (e.g. restart)
        command: String,

        /// File with status lines (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Master base URL
        #[arg(long, env = "DROVER_MASTER_URL")]
        master: Option<Url>,

        /// Credential file (TOML with username and password)
        #[arg(long, env = "DROVER_CREDENTIALS")]
        credentials: Option<PathBuf>,
    },

    /// Fetch a JSON document from the master
    Status {
        /// Path under the master base URL
        path: String,

        /// Master base URL
        #[arg(long, env = "DROVER_MASTER_URL")]
        master: Option<Url>,

        /// Credential file (TOML with username and password)
        #[arg(long, env = "DROVER_CREDENTIALS")]
        credentials: Option<PathBuf>,
    },
}
