//! Errors

use thiserror::Error;

/// Leaderboard core error
#[derive(Debug, Error)]
pub enum Error {
    /// Player name outside the `1..=20` code unit range
    #[error("invalid player name: {0}")]
    InvalidPlayerName(String),
    /// Negative or otherwise out-of-range score
    #[error("invalid score: {0}")]
    InvalidScore(String),
    /// `GetRank` on a player with no row
    #[error("player not found")]
    PlayerNotFound,
    /// Malformed change-channel payload; the caller should log and continue
    #[error("malformed change payload: {0}")]
    MalformedChangePayload(String),
    /// Opaque storage-layer failure
    #[error("storage error: {0}")]
    Database(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Any other internal failure (failed snapshot read, send error to peer, ...)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// `true` for the subset of variants that spec §7 classifies as `InvalidArgument`
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidPlayerName(_) | Error::InvalidScore(_))
    }
}
