//! In-memory [`ScoreStore`]/[`ChangeListener`] test doubles.
//!
//! Mirrors the teacher's `cdk_common::database::mint::test` double: a real (if naive)
//! implementation of the trait, usable by any crate's test suite without a live backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::database::{ChangeConnection, ChangeListener, RawChangePayload, ScoreStore};
use crate::error::Error;
use crate::types::{leaderboard_order, ChangeOp, PlayerName, Score, ScoreEntry};

/// An in-process `ScoreStore` backed by a `Mutex<BTreeMap>`.
///
/// Every successful mutation is also serialized to JSON and pushed onto an internal queue,
/// mimicking the change-channel a real backend publishes to; [`MemoryStore::change_listener`]
/// hands out [`ChangeListener`]s that drain it.
#[derive(Debug)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, ScoreEntry>>,
    changes: mpsc::UnboundedSender<RawChangePayload>,
    changes_rx: Mutex<Option<mpsc::UnboundedReceiver<RawChangePayload>>>,
}

impl MemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rows: Mutex::new(BTreeMap::new()),
            changes: tx,
            changes_rx: Mutex::new(Some(rx)),
        }
    }

    fn publish(&self, player: &PlayerName, score: i64, op: ChangeOp) {
        let payload = serde_json::json!({
            "player_name": player.as_str(),
            "score": score,
            "op": op,
        })
        .to_string();
        let _ = self.changes.send(payload);
    }

    /// Hand out a listener that drains this store's change queue.
    ///
    /// Panics if called more than once: the queue has a single consumer, matching "the
    /// notification connection is held by ChangeSource alone" (spec §5).
    pub fn change_listener(&self) -> MemoryChangeListener {
        let rx = self
            .changes_rx
            .lock()
            .expect("lock poisoned")
            .take()
            .expect("MemoryStore::change_listener called more than once");
        MemoryChangeListener(Mutex::new(Some(rx)))
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    type Err = Error;

    async fn upsert(&self, player: &PlayerName, score: Score) -> Result<(ScoreEntry, bool), Error> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        let now = OffsetDateTime::now_utc();
        let (entry, applied, op) = match rows.get(player.as_str()) {
            None => {
                let entry = ScoreEntry {
                    player: player.clone(),
                    score,
                    updated_at: now,
                };
                (entry, true, ChangeOp::Insert)
            }
            Some(existing) => {
                if score > existing.score {
                    let entry = ScoreEntry {
                        player: player.clone(),
                        score,
                        updated_at: now,
                    };
                    (entry, true, ChangeOp::Update)
                } else {
                    (existing.clone(), false, ChangeOp::Update)
                }
            }
        };
        let emit = applied;
        rows.insert(player.as_str().to_owned(), entry.clone());
        drop(rows);
        if emit {
            self.publish(player, entry.score.value() as i64, op);
        }
        Ok((entry, applied))
    }

    async fn get_top(&self, limit: u32, offset: u32) -> Result<Vec<ScoreEntry>, Error> {
        let rows = self.rows.lock().expect("lock poisoned");
        let mut entries: Vec<ScoreEntry> = rows.values().cloned().collect();
        entries.sort_by(leaderboard_order);
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get(&self, player: &PlayerName) -> Result<Option<ScoreEntry>, Error> {
        Ok(self
            .rows
            .lock()
            .expect("lock poisoned")
            .get(player.as_str())
            .cloned())
    }

    async fn rank(&self, player: &PlayerName) -> Result<Option<i64>, Error> {
        let rows = self.rows.lock().expect("lock poisoned");
        let Some(target) = rows.get(player.as_str()) else {
            return Ok(None);
        };
        let better = rows
            .values()
            .filter(|q| {
                q.score > target.score || (q.score == target.score && q.player < target.player)
            })
            .count();
        Ok(Some(1 + better as i64))
    }

    async fn delete(&self, player: &PlayerName) -> Result<(), Error> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        if let Some(entry) = rows.remove(player.as_str()) {
            drop(rows);
            self.publish(player, entry.score.value() as i64, ChangeOp::Delete);
        }
        Ok(())
    }
}

/// [`ChangeListener`] over a [`MemoryStore`]'s internal queue.
#[derive(Debug)]
pub struct MemoryChangeListener(Mutex<Option<mpsc::UnboundedReceiver<RawChangePayload>>>);

#[async_trait]
impl ChangeListener for MemoryChangeListener {
    type Connection = MemoryChangeConnection;

    async fn connect(&self) -> Result<Self::Connection, Error> {
        let rx = self
            .0
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or_else(|| Error::Internal("memory change listener already connected".into()))?;
        Ok(MemoryChangeConnection(rx))
    }
}

/// The sole connection a [`MemoryChangeListener`] ever hands out.
#[derive(Debug)]
pub struct MemoryChangeConnection(mpsc::UnboundedReceiver<RawChangePayload>);

#[async_trait]
impl ChangeConnection for MemoryChangeConnection {
    async fn recv(&mut self) -> Result<Option<RawChangePayload>, Error> {
        Ok(self.0.recv().await)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn best_score_wins() {
        let store = MemoryStore::new();
        let alice = PlayerName::parse("Alice").unwrap();

        let (entry, applied) = store.upsert(&alice, Score::new(100)).await.unwrap();
        assert!(applied);
        assert_eq!(entry.score.value(), 100);

        let (entry, applied) = store.upsert(&alice, Score::new(50)).await.unwrap();
        assert!(!applied);
        assert_eq!(entry.score.value(), 100);

        let (entry, applied) = store.upsert(&alice, Score::new(200)).await.unwrap();
        assert!(applied);
        assert_eq!(entry.score.value(), 200);
    }

    #[tokio::test]
    async fn rank_breaks_ties_lexicographically() {
        let store = MemoryStore::new();
        for (name, score) in [("Bob", 500), ("Alice", 500), ("Charlie", 500)] {
            store
                .upsert(&PlayerName::parse(name).unwrap(), Score::new(score))
                .await
                .unwrap();
        }
        assert_eq!(
            store.rank(&PlayerName::parse("Alice").unwrap()).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            store.rank(&PlayerName::parse("Bob").unwrap()).await.unwrap(),
            Some(2)
        );
        assert_eq!(
            store.rank(&PlayerName::parse("Charlie").unwrap()).await.unwrap(),
            Some(3)
        );
    }

    #[tokio::test]
    async fn delete_emits_one_change() {
        let store = MemoryStore::new();
        let alice = PlayerName::parse("Alice").unwrap();
        store.upsert(&alice, Score::new(1000)).await.unwrap();

        let mut conn = store.change_listener().connect().await.unwrap();
        conn.recv().await.unwrap(); // drain the insert

        store.delete(&alice).await.unwrap();
        assert!(store.get(&alice).await.unwrap().is_none());

        let payload = conn.recv().await.unwrap().expect("delete change");
        assert!(payload.contains("\"op\":\"delete\""));
    }
}
