//! Storage-facing traits
//!
//! [`ScoreStore`] is the contract spec §4.1 describes. [`ChangeListener`]/[`ChangeConnection`]
//! are the seam [`crate::ChangeEvent`] consumers (`ChangeSource`, in `scoreboard-core`) use to
//! reach the backend's change channel without depending on a concrete driver.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::Error;
use crate::types::{PlayerName, Score, ScoreEntry};

/// Durable storage of `PlayerName -> ScoreEntry`, with atomic best-score upsert.
///
/// Implementors own schema enforcement (`score >= 0`, `1 <= len(player) <= 20`, one row per
/// player) and atomicity of [`ScoreStore::upsert`] with respect to other writers on the same
/// player.
#[async_trait]
pub trait ScoreStore: Debug + Send + Sync {
    /// Backend-specific error type
    type Err: Into<Error> + From<Error> + std::error::Error + Send + Sync + 'static;

    /// Insert-or-update the best score for `player`.
    ///
    /// Returns the post-commit entry and whether this call's `score` moved the stored value
    /// (`applied = (no prior row) || (score > prior.score)`). The stored value itself is always
    /// `max(score, existing)`.
    async fn upsert(&self, player: &PlayerName, score: Score) -> Result<(ScoreEntry, bool), Self::Err>;

    /// Read the top `limit` entries starting at `offset`, ordered by
    /// [`crate::types::leaderboard_order`].
    ///
    /// Callers are expected to have already clamped `limit`/`offset` (see
    /// [`crate::types::clamp_limit`]); the store does not re-clamp.
    async fn get_top(&self, limit: u32, offset: u32) -> Result<Vec<ScoreEntry>, Self::Err>;

    /// Look up a single player's entry.
    async fn get(&self, player: &PlayerName) -> Result<Option<ScoreEntry>, Self::Err>;

    /// 1-based rank: `1 + |{q : q.score > p.score || (q.score == p.score && q.player < p.player)}|`.
    ///
    /// `None` if `player` has no row.
    async fn rank(&self, player: &PlayerName) -> Result<Option<i64>, Self::Err>;

    /// Remove a player's row, if present.
    async fn delete(&self, player: &PlayerName) -> Result<(), Self::Err>;
}

/// A single change-channel payload, pre-parse.
///
/// The wire shape is the JSON object in spec §6.1:
/// `{"player_name": string, "score": i64, "op": "insert"|"update"|"delete"}`. Kept as a raw
/// string so `ChangeSource` (not this trait) owns parse failures and the "drop one malformed
/// message, keep the connection" rule.
pub type RawChangePayload = String;

/// A live connection to the backend's change channel.
///
/// One connection is held by `ChangeSource` at a time; it is never shared (spec §5, "the
/// notification connection is held by ChangeSource alone").
#[async_trait]
pub trait ChangeConnection: Send {
    /// Await the next payload, or `Ok(None)` if the channel was closed cleanly.
    ///
    /// An `Err` here is a transient failure (spec §4.2) that should trigger reconnect-with-backoff,
    /// not a malformed-payload condition (those are represented as `Ok(Some(_))` with content
    /// that fails to parse, and handled by the caller).
    async fn recv(&mut self) -> Result<Option<RawChangePayload>, Error>;
}

/// Acquires [`ChangeConnection`]s to the backend's change channel.
#[async_trait]
pub trait ChangeListener: Debug + Send + Sync {
    /// The connection type this listener hands out
    type Connection: ChangeConnection;

    /// Acquire a dedicated connection and subscribe to the change channel.
    async fn connect(&self) -> Result<Self::Connection, Error>;
}
