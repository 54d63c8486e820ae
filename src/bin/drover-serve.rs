//! # drover-serve
//!
//! Direct launcher: workers are started as `drover-serve --config <doc>#<app> ...`.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    drover::run().await
}
