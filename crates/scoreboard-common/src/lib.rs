//! Domain types, errors and storage traits for the real-time leaderboard core.
//!
//! This crate has no I/O of its own: it is the seam `scoreboard-core` (the fan-out engine) and
//! `scoreboard-postgres` (the storage backend) are both built against.

#![warn(missing_docs)]

pub mod database;
pub mod error;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use database::{ChangeConnection, ChangeListener, RawChangePayload, ScoreStore};
pub use error::Error;
pub use types::{
    clamp_limit, clamp_offset, leaderboard_order, ChangeEvent, ChangeOp, Frame, PlayerName,
    Score, ScoreEntry, Snapshot, Update, UpdateKind, DEFAULT_LIMIT, MAX_LIMIT,
};
