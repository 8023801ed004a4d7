//! bizscout CLI: business lead discovery and enrichment.
//!
//! Finds companies through a places search, scrapes their websites for
//! contact emails, and enriches them with domain intelligence.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; the variables may come from the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
