//! Leaderboard domain types

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Default `limit`/`initial_limit` when the caller passes `<= 0`
pub const DEFAULT_LIMIT: u32 = 10;
/// Hard ceiling `limit`/`initial_limit` are clamped to
pub const MAX_LIMIT: u32 = 100;
/// Minimum valid player name length, in UTF-16 code units
pub const MIN_PLAYER_NAME_LEN: usize = 1;
/// Maximum valid player name length, in UTF-16 code units
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Clamp a caller-supplied limit into `[1, MAX_LIMIT]`, defaulting non-positive values to
/// [`DEFAULT_LIMIT`].
pub fn clamp_limit(limit: i64) -> u32 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        (limit as u64).min(MAX_LIMIT as u64) as u32
    }
}

/// Clamp a caller-supplied offset to `>= 0`.
pub fn clamp_offset(offset: i64) -> u32 {
    offset.max(0) as u32
}

/// Validated player name: a non-empty printable string, 1-20 UTF-16 code units.
///
/// Immutable once constructed; this is the identity of a score.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    /// Validate and wrap a player name.
    pub fn parse(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let len = name.encode_utf16().count();
        if !(MIN_PLAYER_NAME_LEN..=MAX_PLAYER_NAME_LEN).contains(&len) {
            return Err(Error::InvalidPlayerName(format!(
                "length {len} outside [{MIN_PLAYER_NAME_LEN}, {MAX_PLAYER_NAME_LEN}]"
            )));
        }
        Ok(Self(name))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PlayerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A non-negative score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u64);

impl Score {
    /// Validate and wrap a raw score value.
    ///
    /// `raw` is `i64` because it is the type callers naturally hold (wire formats, `CHECK >= 0`
    /// columns); negative values are rejected here rather than at the type boundary.
    pub fn parse(raw: i64) -> Result<Self, Error> {
        if raw < 0 {
            return Err(Error::InvalidScore(format!("{raw} is negative")));
        }
        Ok(Self(raw as u64))
    }

    /// Construct from an already-validated non-negative value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A stored `{player, score, updated_at}` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Player identity
    pub player: PlayerName,
    /// Best score on record
    pub score: Score,
    /// When `score` was last set (RFC 3339 UTC on the wire)
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Ordering rule (spec §3, global): `score DESC, player ASC`.
///
/// Not implemented as `Ord` on `ScoreEntry` itself, since the natural field order (player, then
/// score) is not the leaderboard order and a silent `#[derive(Ord)]` here would be a trap for
/// the next person who adds a field.
pub fn leaderboard_order(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.player.cmp(&b.player))
}

/// The kind of mutation that produced a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// First row for a player
    Insert,
    /// An existing row's score changed (higher or lower; admin mutations included)
    Update,
    /// Row removed
    Delete,
}

/// A single row-level change, as published on the store's change channel (spec §6.1).
///
/// `score` is the post-commit value for insert/update, and the pre-delete value for delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Player the change applies to
    pub player_name: String,
    /// Post-commit score (pre-delete score for `Delete`)
    pub score: i64,
    /// What kind of mutation produced this event
    pub op: ChangeOp,
}

/// The kind of a [`Update`] delivered to a live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateKind {
    /// Player's entry was inserted or changed
    Upsert,
    /// Player's entry was removed
    Delete,
}

/// A single delta forwarded from the [`Broadcaster`](crate) to a subscriber's mailbox.
///
/// `entry.updated_at` is best-effort broadcast time, not commit time (spec §4.3 step 2):
/// the change notification does not carry the commit timestamp, so consumers must treat it as
/// advisory for ordering and rely on delivery order as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Upsert or delete
    pub kind: UpdateKind,
    /// The affected entry (score is the post-commit value; for `Delete`, the pre-delete value)
    pub entry: ScoreEntry,
}

/// The initial ordered top-K snapshot sent once at subscription start (spec §4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Entries, sorted by [`leaderboard_order`]
    pub entries: Vec<ScoreEntry>,
}

/// Either the one-time [`Snapshot`] or a subsequent [`Update`], as delivered to a streaming
/// client (spec §4.5, §6.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind_frame")]
pub enum Frame {
    /// The initial top-K snapshot
    Snapshot(Snapshot),
    /// A subsequent delta
    Delta(Update),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn player_name_boundaries() {
        assert!(PlayerName::parse("").is_err());
        assert!(PlayerName::parse("a".repeat(21)).is_err());
        assert!(PlayerName::parse("a").is_ok());
        assert!(PlayerName::parse("a".repeat(20)).is_ok());
    }

    #[test]
    fn score_boundaries() {
        assert!(Score::parse(-1).is_err());
        assert_eq!(Score::parse(0).unwrap().value(), 0);
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(0), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(-5), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(200), MAX_LIMIT);
        assert_eq!(clamp_limit(5), 5);
    }

    fn entry(player: &str, score: u64) -> ScoreEntry {
        ScoreEntry {
            player: PlayerName::parse(player).unwrap(),
            score: Score::new(score),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn ordering_tiebreak() {
        let mut entries = vec![entry("Bob", 500), entry("Alice", 500), entry("Charlie", 500)];
        entries.sort_by(leaderboard_order);
        let names: Vec<_> = entries.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    }

    #[test]
    fn ordering_score_desc() {
        let mut entries = vec![entry("Alice", 100), entry("Bob", 900)];
        entries.sort_by(leaderboard_order);
        let names: Vec<_> = entries.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
    }
}
