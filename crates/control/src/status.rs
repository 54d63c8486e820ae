//! Status line grammar: `<package>.<app> (<host>:<pid>) <free text>`.

use std::sync::LazyLock;

use drover_core::Host;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

static STATUS_LINE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^([^.\s()]+)\.([^.\s()]+) \(([^:\s()]+):(\d+)\)(?:\s.*)?$")
});

/// One fleet member named by a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub package: String,
    pub app: String,
    pub host: Host,
    pub pid: u32,
}

/// Serialized as a `[package, app, host, pid]` tuple, the master's wire shape.
impl Serialize for NodeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.package, &self.app, self.host.as_str(), self.pid).serialize(serializer)
    }
}

/// Parse one status line.
///
/// # Errors
///
/// Returns [`Error::MalformedStatusLine`] if the line does not match the
/// grammar or the pid does not fit in a `u32`.
pub fn parse_status_line(line: &str) -> Result<NodeStatus> {
    let regex = STATUS_LINE
        .as_ref()
        .map_err(|e| Error::malformed_status_line(line, e.to_string()))?;
    let trimmed = line.trim_end();
    let captures = regex
        .captures(trimmed)
        .ok_or_else(|| Error::malformed_status_line(line, "expected 'PACKAGE.APP (HOST:PID) ...'"))?;

    let field = |index: usize| captures.get(index).map_or("", |m| m.as_str());
    let pid = field(4)
        .parse::<u32>()
        .map_err(|e| Error::malformed_status_line(line, format!("invalid pid: {e}")))?;

    Ok(NodeStatus {
        package: field(1).to_string(),
        app: field(2).to_string(),
        host: Host::new(field(3)),
        pid,
    })
}

/// Result of parsing a batch: the good lines and the rejected ones.
#[derive(Debug, Default)]
pub struct StatusBatch {
    pub nodes: Vec<NodeStatus>,
    /// One [`Error::MalformedStatusLine`] per rejected line, in input order.
    pub rejected: Vec<Error>,
}

/// Parse many status lines; a bad line never aborts the batch.
///
/// Blank lines are skipped.
pub fn parse_status_lines<I, S>(lines: I) -> StatusBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|line| !line.as_ref().trim().is_empty())
        .fold(StatusBatch::default(), |mut batch, line| {
            match parse_status_line(line.as_ref()) {
                Ok(node) => batch.nodes.push(node),
                Err(e) => batch.rejected.push(e),
            }
            batch
        })
}
