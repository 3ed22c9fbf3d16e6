//! Process entry point: loads configuration, starts the Postgres-backed leaderboard core, and
//! runs until a shutdown signal arrives.
//!
//! No wire transport lives here — gRPC/HTTP/CLI front ends are separate collaborators that would
//! hold a [`scoreboard_core::Service`] clone and register subscriber mailboxes against the
//! [`scoreboard_core::Broadcaster`] this process starts.

mod cli;
mod config;
mod logging;
mod setup;

use anyhow::Result;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let mut settings = config::Settings::load(args.config.as_deref().map(std::path::Path::new))?;
    if let Some(db) = args.db {
        settings.database.url = db;
    }

    logging::init(&settings.log_filter);
    info!("starting scoreboard-daemon");

    let runtime = setup::Runtime::start(&settings).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    runtime.shutdown();
    Ok(())
}
