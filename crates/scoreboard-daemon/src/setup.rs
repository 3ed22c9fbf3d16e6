use std::sync::Arc;

use anyhow::Result;
use scoreboard_core::{Broadcaster, ChangeSource, Service};
use scoreboard_postgres::{PgChangeListener, PgScoreStore};
use tracing::info;

use crate::config::Settings;

/// Everything the process keeps alive for its lifetime.
pub struct Runtime {
    /// Validation + best-score facade, cheap to clone and hand to a transport layer
    pub service: Service<PgScoreStore>,
    /// Fan-out hub; a transport layer registers subscriber mailboxes against it
    pub broadcaster: Arc<Broadcaster>,
    change_source_task: tokio::task::JoinHandle<()>,
}

impl Runtime {
    /// Connect to Postgres, apply schema, and start the change-source/broadcaster pipeline.
    pub async fn start(settings: &Settings) -> Result<Self> {
        let store = PgScoreStore::connect_with(
            settings.database.url.clone(),
            settings.database.pool_size,
            scoreboard_postgres::DEFAULT_CHECKOUT_TIMEOUT,
        )
        .await?;
        info!("connected to postgres and applied schema");

        let listener = PgChangeListener::new(settings.database.url.clone());
        let change_source =
            ChangeSource::start_with_capacity(listener, settings.streaming.events_capacity, 16);

        let broadcaster = Broadcaster::new();
        let change_source_task = broadcaster.clone().spawn(change_source);

        let service = Service::new(Arc::new(store));

        Ok(Self {
            service,
            broadcaster,
            change_source_task,
        })
    }

    /// Stop the background fan-out task. Called on shutdown.
    pub fn shutdown(self) {
        self.change_source_task.abort();
    }
}
