//! metron demo entry point.

use anyhow::Context;
use metron::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Run the workload until the configured duration elapses
    cli::execute(cli).await.context("metron demo failed")
}
