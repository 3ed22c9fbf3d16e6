//! Fans out a single change stream to every live subscriber mailbox (spec §4.3).
//!
//! The central tradeoff: liveness of the hub over completeness per slow subscriber. A
//! subscriber that cannot keep up drops updates locally; it never impedes another subscriber or
//! the global event loop. Slow subscribers recover via reconnect + fresh snapshot (spec §4.5).

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use scoreboard_common::{ChangeEvent, ChangeOp, PlayerName, Score, ScoreEntry, Update, UpdateKind};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::change_source::ChangeSource;

/// Identifies one live subscriber's mailbox in the [`Broadcaster`]'s registry.
pub type SubscriberId = Uuid;

/// Recommended per-subscriber mailbox capacity (spec §4.3).
pub const DEFAULT_MAILBOX_CAPACITY: usize = 50;
/// Bound on the unregister queue (mirrors the teacher's `DEFAULT_REMOVE_SIZE`).
const UNREGISTER_QUEUE_SIZE: usize = 10_000;

#[derive(Debug)]
struct Mailbox {
    sender: mpsc::Sender<Update>,
    dropped: Arc<AtomicU64>,
}

/// Single-reader/multi-writer fan-out hub.
///
/// The subscriber set is the only mutable shared structure (spec §5): readers are the broadcast
/// fan-out, writers are add/remove. Each mailbox itself is single-writer (this struct) /
/// single-reader (its [`MailboxHandle`]), so no per-mailbox lock is needed.
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: Arc<RwLock<HashMap<SubscriberId, Mailbox>>>,
    unregister: mpsc::Sender<SubscriberId>,
    reaper: JoinHandle<()>,
}

impl Broadcaster {
    /// Construct an empty hub and start its background unregister reaper.
    pub fn new() -> Arc<Self> {
        let subscribers: Arc<RwLock<HashMap<SubscriberId, Mailbox>>> = Arc::default();
        let (unregister, rx) = mpsc::channel(UNREGISTER_QUEUE_SIZE);
        let reaper = tokio::spawn(reap(subscribers.clone(), rx));
        Arc::new(Self {
            subscribers,
            unregister,
            reaper,
        })
    }

    /// Register a new mailbox with [`DEFAULT_MAILBOX_CAPACITY`].
    ///
    /// The returned [`MailboxHandle`] unregisters itself from this hub when dropped — no caller
    /// back-pointer to the `Subscription` is needed, just the id (spec §9, "cyclic reference
    /// risk").
    pub async fn add_subscriber(&self) -> MailboxHandle {
        self.add_subscriber_with_capacity(DEFAULT_MAILBOX_CAPACITY).await
    }

    /// Like [`Broadcaster::add_subscriber`] with an explicit mailbox capacity.
    pub async fn add_subscriber_with_capacity(&self, capacity: usize) -> MailboxHandle {
        let (sender, receiver) = mpsc::channel(capacity);
        let id = Uuid::new_v4();
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers.write().await.insert(
            id,
            Mailbox {
                sender,
                dropped: dropped.clone(),
            },
        );
        MailboxHandle {
            id,
            receiver,
            dropped,
            unregister: self.unregister.clone(),
        }
    }

    /// Number of currently registered mailboxes.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drive `source` forever, fanning each [`ChangeEvent`] out to every registered mailbox.
    ///
    /// Returns when `source` closes (its owning process is shutting down); every remaining
    /// mailbox is left registered for its own `Subscription` to notice the closed channel.
    pub fn spawn(self: Arc<Self>, mut source: ChangeSource) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = source.recv_event().await {
                self.dispatch(event).await;
            }
        })
    }

    #[instrument(skip(self))]
    async fn dispatch(&self, event: ChangeEvent) {
        let kind = match event.op {
            ChangeOp::Insert | ChangeOp::Update => UpdateKind::Upsert,
            ChangeOp::Delete => UpdateKind::Delete,
        };

        let player = match PlayerName::parse(event.player_name.clone()) {
            Ok(player) => player,
            Err(err) => {
                warn!(error = %err, "skipping change event with invalid player name");
                return;
            }
        };
        let score = match Score::parse(event.score) {
            Ok(score) => score,
            Err(err) => {
                warn!(error = %err, "skipping change event with invalid score");
                return;
            }
        };

        let update = Update {
            kind,
            entry: ScoreEntry {
                player,
                score,
                updated_at: SystemTime::now().into(),
            },
        };

        // Clone senders out while holding only the shared read lock, then send outside it:
        // no mailbox operation holds the lock across a (non-blocking) send.
        let targets: Vec<_> = self
            .subscribers
            .read()
            .await
            .values()
            .map(|mailbox| (mailbox.sender.clone(), mailbox.dropped.clone()))
            .collect();

        for (sender, dropped) in targets {
            if sender.try_send(update.clone()).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.reaper.abort();
    }
}

async fn reap(
    subscribers: Arc<RwLock<HashMap<SubscriberId, Mailbox>>>,
    mut queue: mpsc::Receiver<SubscriberId>,
) {
    while let Some(id) = queue.recv().await {
        debug!(%id, "unregistering subscriber");
        subscribers.write().await.remove(&id);
    }
}

/// A registered mailbox's receiving half.
///
/// Unregisters from the owning [`Broadcaster`] when dropped, the same way the client's
/// `Subscription` gives it up (client disconnect, mailbox error, or server shutdown) without the
/// `Broadcaster` ever holding a reference back to the `Subscription` itself.
#[derive(Debug)]
pub struct MailboxHandle {
    id: SubscriberId,
    receiver: mpsc::Receiver<Update>,
    dropped: Arc<AtomicU64>,
    unregister: mpsc::Sender<SubscriberId>,
}

impl MailboxHandle {
    /// This mailbox's subscriber id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Number of updates dropped for this subscriber because its mailbox was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Deref for MailboxHandle {
    type Target = mpsc::Receiver<Update>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl DerefMut for MailboxHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}

impl Drop for MailboxHandle {
    fn drop(&mut self) {
        let _ = self.unregister.try_send(self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scoreboard_common::ChangeOp;
    use std::time::Duration;

    fn event(player: &str, score: i64, op: ChangeOp) -> ChangeEvent {
        ChangeEvent {
            player_name: player.to_owned(),
            score,
            op,
        }
    }

    #[tokio::test]
    async fn fans_out_to_all_subscribers() {
        let hub = Broadcaster::new();
        let mut h1 = hub.add_subscriber().await;
        let mut h2 = hub.add_subscriber().await;

        hub.dispatch(event("Alice", 100, ChangeOp::Insert)).await;

        let u1 = h1.try_recv().unwrap();
        let u2 = h2.try_recv().unwrap();
        assert_eq!(u1.kind, UpdateKind::Upsert);
        assert_eq!(u2.kind, UpdateKind::Upsert);
        assert_eq!(u1.entry.player.as_str(), "Alice");
    }

    #[tokio::test]
    async fn delete_maps_to_delete_kind() {
        let hub = Broadcaster::new();
        let mut h = hub.add_subscriber().await;
        hub.dispatch(event("Alice", 1000, ChangeOp::Delete)).await;
        assert_eq!(h.try_recv().unwrap().kind, UpdateKind::Delete);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_without_blocking_others() {
        let hub = Broadcaster::new();
        let slow = hub.add_subscriber_with_capacity(1).await;
        let mut fast = hub.add_subscriber_with_capacity(50).await;

        for i in 0..10 {
            hub.dispatch(event("Alice", 100 + i, ChangeOp::Update)).await;
        }

        assert!(slow.dropped_count() > 0);
        let mut count = 0;
        while fast.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn drop_unregisters_mailbox() {
        let hub = Broadcaster::new();
        let handle = hub.add_subscriber().await;
        assert_eq!(hub.subscriber_count().await, 1);
        drop(handle);
        // the reaper runs asynchronously; give it a turn
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }
}
