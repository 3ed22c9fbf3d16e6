//! [`ChangeListener`]/[`ChangeConnection`] over Postgres `LISTEN`/`NOTIFY` (spec §6.1).
//!
//! `tokio_postgres` delivers notifications through the same `Connection` future that drives the
//! socket, so a listening connection cannot be pooled alongside ordinary query connections: it is
//! opened once per [`ChangeConnection`] and held for the connection's whole lifetime, exactly the
//! "dedicated connection" the spec calls for (§4.2).

use async_trait::async_trait;
use scoreboard_common::{ChangeConnection, ChangeListener, Error, RawChangePayload};
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};
use tracing::{debug, warn};

use crate::schema::CHANGE_CHANNEL;

/// Acquires dedicated `LISTEN` connections against a fixed Postgres connection string.
#[derive(Debug, Clone)]
pub struct PgChangeListener {
    conn_str: String,
}

impl PgChangeListener {
    /// Listen for changes on the database at `conn_str`.
    pub fn new(conn_str: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
        }
    }
}

#[async_trait]
impl ChangeListener for PgChangeListener {
    type Connection = PgChangeConnection;

    async fn connect(&self) -> Result<Self::Connection, Error> {
        let (client, mut connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(|err| Error::Database(Box::new(err)))?;

        let (notifications_tx, notifications_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                match futures_util::future::poll_fn(|cx| connection.poll_message(cx)).await {
                    Some(Ok(AsyncMessage::Notification(note))) => {
                        if notifications_tx.send(note.payload().to_owned()).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "postgres listen connection failed");
                        return;
                    }
                    None => {
                        debug!("postgres listen connection closed");
                        return;
                    }
                }
            }
        });

        client
            .batch_execute(&format!("LISTEN {CHANGE_CHANNEL}"))
            .await
            .map_err(|err| Error::Database(Box::new(err)))?;

        Ok(PgChangeConnection {
            _client: client,
            notifications: notifications_rx,
        })
    }
}

/// A single dedicated `LISTEN` connection.
///
/// Holds the `Client` alive for the lifetime of the notification stream; dropping it closes the
/// socket and ends the background forwarding task.
pub struct PgChangeConnection {
    _client: tokio_postgres::Client,
    notifications: mpsc::Receiver<String>,
}

impl std::fmt::Debug for PgChangeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgChangeConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl ChangeConnection for PgChangeConnection {
    async fn recv(&mut self) -> Result<Option<RawChangePayload>, Error> {
        Ok(self.notifications.recv().await)
    }
}
