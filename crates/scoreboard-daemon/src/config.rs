use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Postgres connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    /// `tokio_postgres` connection string (libpq key=value or URI form)
    pub url: String,
    /// Bounded connection pool size
    pub pool_size: usize,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "host=localhost user=postgres dbname=scoreboard".to_owned(),
            pool_size: scoreboard_postgres::DEFAULT_POOL_SIZE,
        }
    }
}

/// Streaming fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streaming {
    /// Per-subscriber mailbox capacity
    pub mailbox_capacity: usize,
    /// `ChangeSource` events-channel capacity
    pub events_capacity: usize,
}

impl Default for Streaming {
    fn default() -> Self {
        Self {
            mailbox_capacity: scoreboard_core::DEFAULT_MAILBOX_CAPACITY,
            events_capacity: 256,
        }
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Postgres connection settings
    pub database: Database,
    /// Streaming fan-out tuning
    #[serde(default)]
    pub streaming: Streaming,
    /// `RUST_LOG`-style filter directive, e.g. `info` or `scoreboard_core=debug,info`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Settings {
    /// Load defaults, layer a TOML file (if present) over them, then environment variables
    /// prefixed `SCOREBOARD_` (double-underscore separated, e.g. `SCOREBOARD_DATABASE__URL`).
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Path::new("config.toml");
        let path = config_path.unwrap_or(default_path);

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("SCOREBOARD")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let settings = Settings::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.streaming.mailbox_capacity, scoreboard_core::DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn env_var_overrides_database_url() {
        std::env::set_var("SCOREBOARD_DATABASE__URL", "host=test user=test dbname=test");
        let settings = Settings::load(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(settings.database.url, "host=test user=test dbname=test");
        std::env::remove_var("SCOREBOARD_DATABASE__URL");
    }
}
