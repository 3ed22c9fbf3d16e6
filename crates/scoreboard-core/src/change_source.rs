//! Converts a store's change channel into an in-process stream of [`ChangeEvent`]s, surviving
//! transient failures (spec §4.2).
//!
//! Modeled as the state machine spec §9 asks for (`Disconnected -> Connecting -> Listening ->
//! Disconnected`) rather than retry state buried in loop variables: [`run`] below *is* that
//! machine, just written as a loop instead of an explicit enum, since Rust's `loop` + `match`
//! already gives each state a distinct, named arm.

use std::time::Duration;

use scoreboard_common::{ChangeConnection, ChangeEvent, ChangeListener};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Minimum `events` channel capacity (spec §4.2: "bounded, capacity >= 100").
pub const MIN_EVENTS_CAPACITY: usize = 100;
/// Default `events` channel capacity.
pub const DEFAULT_EVENTS_CAPACITY: usize = 256;
/// Default `errors` channel capacity ("bounded, small").
pub const DEFAULT_ERRORS_CAPACITY: usize = 16;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// How long to wait for room in a full `events` channel before giving up on one event.
const FULL_CHANNEL_GRACE: Duration = Duration::from_secs(1);

/// A running change-channel consumer.
///
/// Dropping this cancels the background task and releases the underlying connection.
#[derive(Debug)]
pub struct ChangeSource {
    events: mpsc::Receiver<ChangeEvent>,
    errors: mpsc::Receiver<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChangeSource {
    /// Start consuming `listener`'s change channel in the background.
    pub fn start<L>(listener: L) -> Self
    where
        L: ChangeListener + 'static,
    {
        Self::start_with_capacity(listener, DEFAULT_EVENTS_CAPACITY, DEFAULT_ERRORS_CAPACITY)
    }

    /// Like [`ChangeSource::start`] with explicit channel capacities.
    ///
    /// `events_capacity` is raised to [`MIN_EVENTS_CAPACITY`] if given a smaller value.
    pub fn start_with_capacity<L>(listener: L, events_capacity: usize, errors_capacity: usize) -> Self
    where
        L: ChangeListener + 'static,
    {
        let events_capacity = events_capacity.max(MIN_EVENTS_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(events_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(errors_capacity);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(listener, events_tx, errors_tx, cancel.clone()));

        Self {
            events: events_rx,
            errors: errors_rx,
            cancel,
            task,
        }
    }

    /// Await the next change event.
    ///
    /// Returns `None` once the source has been cancelled and drained.
    pub async fn recv_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Drain one pending error (transient-failure or malformed-payload notice), if any.
    pub fn try_recv_error(&mut self) -> Option<String> {
        self.errors.try_recv().ok()
    }

    /// Request shutdown. Closes both streams and releases the underlying connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChangeSource {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

#[instrument(skip_all)]
async fn run<L: ChangeListener>(
    listener: L,
    events_tx: mpsc::Sender<ChangeEvent>,
    errors_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    while !cancel.is_cancelled() {
        match listener.connect().await {
            Ok(mut conn) => {
                debug!("change source connected");
                backoff = INITIAL_BACKOFF;
                listen_until_disconnected(&mut conn, &events_tx, &errors_tx, &cancel).await;
            }
            Err(err) => {
                warn!(error = %err, "failed to acquire change-channel connection");
                let _ = errors_tx.try_send(err.to_string());
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Drains one live connection until it errors, closes, or is cancelled.
async fn listen_until_disconnected<C: ChangeConnection>(
    conn: &mut C,
    events_tx: &mpsc::Sender<ChangeEvent>,
    errors_tx: &mpsc::Sender<String>,
    cancel: &CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return,
            res = conn.recv() => res,
        };

        match payload {
            Ok(Some(raw)) => match serde_json::from_str::<ChangeEvent>(&raw) {
                Ok(event) => deliver(events_tx, event).await,
                Err(parse_err) => {
                    warn!(error = %parse_err, "dropping malformed change payload");
                    let _ = errors_tx.try_send(format!("malformed change payload: {parse_err}"));
                }
            },
            Ok(None) => {
                debug!("change channel closed cleanly, reconnecting");
                return;
            }
            Err(err) => {
                warn!(error = %err, "change channel read failed, reconnecting");
                let _ = errors_tx.try_send(err.to_string());
                return;
            }
        }
    }
}

/// At-most-once delivery with the bounded-wait-then-drop rule (spec §4.2).
async fn deliver(events_tx: &mpsc::Sender<ChangeEvent>, event: ChangeEvent) {
    let event = match events_tx.try_send(event) {
        Ok(()) => return,
        Err(mpsc::error::TrySendError::Closed(_)) => return,
        Err(mpsc::error::TrySendError::Full(event)) => event,
    };

    tokio::time::sleep(FULL_CHANNEL_GRACE).await;

    if events_tx.try_send(event).is_err() {
        warn!("events channel still full after grace period, dropping change event");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scoreboard_common::test_utils::MemoryStore;
    use scoreboard_common::{ChangeOp, PlayerName, Score, ScoreStore};
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_change_events_in_order() {
        let store = MemoryStore::new();
        let listener = store.change_listener();

        store
            .upsert(&PlayerName::parse("Alice").unwrap(), Score::new(1000))
            .await
            .unwrap();
        store
            .upsert(&PlayerName::parse("Bob").unwrap(), Score::new(800))
            .await
            .unwrap();

        let mut source = ChangeSource::start(listener);

        let first = tokio::time::timeout(Duration::from_secs(1), source.recv_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.player_name, "Alice");
        assert_eq!(first.op, ChangeOp::Insert);

        let second = tokio::time::timeout(Duration::from_secs(1), source.recv_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.player_name, "Bob");
    }
}
