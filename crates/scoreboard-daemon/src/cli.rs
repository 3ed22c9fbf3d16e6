use clap::Parser;

/// Command-line overrides for [`crate::config::Settings`].
#[derive(Parser, Debug)]
#[command(about = "Real-time leaderboard core process", version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Path to a TOML config file (default: `./config.toml`)
    #[arg(short, long, required = false)]
    pub config: Option<String>,
    /// Postgres connection string, overriding `[database].url`
    #[arg(long, required = false)]
    pub db: Option<String>,
}
