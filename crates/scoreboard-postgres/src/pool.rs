//! A small connection pool over `tokio_postgres::Client`.
//!
//! Deliberately not the generic `DatabasePool`/`Pool<RM>` machinery the wider ecosystem sometimes
//! reaches for: a single fixed schema needs one resource kind, not a type-parameterized manager.
//! What is kept from that lineage is the shape — bounded size, checked-out resources that return
//! themselves to the pool on drop, a wait queue instead of a hard failure when exhausted — redone
//! with `tokio::sync::Semaphore` in place of a blocking `Condvar`, since checkout itself is async.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio_postgres::{Client, Error as PgError, NoTls};
use tracing::{debug, warn};

/// Pool checkout / connection-establishment failures.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// `tokio_postgres` failed to establish a connection.
    #[error("failed to connect to postgres: {0}")]
    Connect(#[source] PgError),
    /// No connection became available before the checkout timeout elapsed.
    #[error("timed out waiting for a pooled connection")]
    Timeout,
}

/// Bounded pool of live `tokio_postgres::Client` connections to a single database.
pub struct PgPool {
    conn_str: String,
    idle: Mutex<Vec<Client>>,
    permits: Arc<Semaphore>,
    checkout_timeout: Duration,
}

impl std::fmt::Debug for PgPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPool")
            .field("available_permits", &self.permits.available_permits())
            .field("checkout_timeout", &self.checkout_timeout)
            .finish()
    }
}

impl PgPool {
    /// Build a pool. No connections are opened eagerly; the first `checkout` opens one.
    pub fn new(conn_str: impl Into<String>, max_size: usize, checkout_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            conn_str: conn_str.into(),
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(max_size)),
            checkout_timeout,
        })
    }

    /// Check out a connection, reusing an idle one or opening a fresh one if the pool has room.
    pub async fn checkout(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        let permit = tokio::time::timeout(self.checkout_timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| PoolError::Timeout)?
            .expect("semaphore is never closed");

        if let Some(client) = self.idle.lock().await.pop() {
            return Ok(PooledConnection {
                client: Some(client),
                pool: self.clone(),
                _permit: permit,
            });
        }

        let (client, connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(PoolError::Connect)?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection task ended");
            }
        });
        debug!("opened new postgres connection");

        Ok(PooledConnection {
            client: Some(client),
            pool: self.clone(),
            _permit: permit,
        })
    }

    async fn release(&self, client: Client) {
        self.idle.lock().await.push(client);
    }
}

/// A checked-out connection. Returns itself to the pool's idle list when dropped.
pub struct PooledConnection {
    client: Option<Client>,
    pool: Arc<PgPool>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledConnection {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client taken only on drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            let pool = self.pool.clone();
            tokio::spawn(async move { pool.release(client).await });
        }
    }
}
