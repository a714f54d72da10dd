//! LeadScout CLI — rate-governed business lead discovery.
//!
//! Scans business directories for an industry and city, checks how fresh
//! each business's website is, and exports deduplicated, scored leads.

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
