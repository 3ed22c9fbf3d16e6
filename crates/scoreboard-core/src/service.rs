//! Input validation, best-score semantics, and a pure-function facade over a [`ScoreStore`].
//!
//! No operation here performs concurrency coordination beyond the store's own atomicity;
//! `Service` holds nothing but a store handle (spec §4.4: "Service is stateless").

use std::sync::Arc;

use scoreboard_common::{clamp_limit, clamp_offset, Error, PlayerName, Score, ScoreEntry, ScoreStore};
use tracing::instrument;

/// Outcome of [`Service::submit_score`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Post-commit entry (authoritative: the store computed it via `max()`)
    pub entry: ScoreEntry,
    /// Whether *this* submission moved the stored value
    pub applied: bool,
}

/// Outcome of [`Service::get_rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based rank
    pub rank: i64,
    /// The player's entry
    pub entry: ScoreEntry,
}

/// Validation + best-score facade over a [`ScoreStore`].
#[derive(Debug)]
pub struct Service<S: ScoreStore> {
    store: Arc<S>,
}

impl<S: ScoreStore> Clone for Service<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ScoreStore> Service<S> {
    /// Build a service over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and submit a player's score, applying the best-score rule.
    #[instrument(skip(self), fields(player = %player, score))]
    pub async fn submit_score(&self, player: &str, score: i64) -> Result<SubmitOutcome, Error> {
        let player = PlayerName::parse(player)?;
        let score = Score::parse(score)?;
        let (entry, applied) = self.store.upsert(&player, score).await.map_err(Into::into)?;
        Ok(SubmitOutcome { entry, applied })
    }

    /// Read the top entries, clamping `limit` (default [`scoreboard_common::DEFAULT_LIMIT`],
    /// ceiling [`scoreboard_common::MAX_LIMIT`]) and `offset` (floor `0`).
    #[instrument(skip(self))]
    pub async fn get_top(&self, limit: i64, offset: i64) -> Result<Vec<ScoreEntry>, Error> {
        let limit = clamp_limit(limit);
        let offset = clamp_offset(offset);
        self.store.get_top(limit, offset).await.map_err(Into::into)
    }

    /// Look up a player's rank and entry, or [`Error::PlayerNotFound`].
    #[instrument(skip(self), fields(player = %player))]
    pub async fn get_rank(&self, player: &str) -> Result<RankedEntry, Error> {
        let player = PlayerName::parse(player)?;
        let entry = self
            .store
            .get(&player)
            .await
            .map_err(Into::into)?
            .ok_or(Error::PlayerNotFound)?;
        let rank = self
            .store
            .rank(&player)
            .await
            .map_err(Into::into)?
            .ok_or(Error::PlayerNotFound)?;
        Ok(RankedEntry { rank, entry })
    }

    /// Validate and delete a player's row.
    #[instrument(skip(self), fields(player = %player))]
    pub async fn delete(&self, player: &str) -> Result<(), Error> {
        let player = PlayerName::parse(player)?;
        self.store.delete(&player).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scoreboard_common::test_utils::MemoryStore;

    fn service() -> Service<MemoryStore> {
        Service::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn best_score_wins_end_to_end() {
        let svc = service();
        let out = svc.submit_score("Alice", 100).await.unwrap();
        assert!(out.applied);
        assert_eq!(out.entry.score.value(), 100);

        let out = svc.submit_score("Alice", 50).await.unwrap();
        assert!(!out.applied);
        assert_eq!(out.entry.score.value(), 100);

        let out = svc.submit_score("Alice", 200).await.unwrap();
        assert!(out.applied);
        assert_eq!(out.entry.score.value(), 200);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let svc = service();
        assert!(svc.submit_score("", 10).await.unwrap_err().is_invalid_argument());
        assert!(svc
            .submit_score(&"a".repeat(21), 10)
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(svc.submit_score("Alice", -1).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn get_rank_not_found() {
        let svc = service();
        let err = svc.get_rank("Ghost").await.unwrap_err();
        assert!(matches!(err, Error::PlayerNotFound));
    }

    #[tokio::test]
    async fn get_top_clamps_limit() {
        let svc = service();
        for (name, score) in [("Alice", 1000), ("Bob", 800), ("Charlie", 900)] {
            svc.submit_score(name, score).await.unwrap();
        }
        let top = svc.get_top(0, 0).await.unwrap();
        assert_eq!(top.len(), 3); // limit=0 clamps to default (10), still returns all 3
        assert_eq!(top[0].player.as_str(), "Alice");
        assert_eq!(top[1].player.as_str(), "Charlie");
        assert_eq!(top[2].player.as_str(), "Bob");
    }
}
