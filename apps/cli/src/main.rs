//! toolscope CLI: coordinator console over the survey platform.
//!
//! Aggregates per-tool evaluation summaries from the survey sources and
//! reconstructs coordinator workload from the reassignment log.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
