//! Postgres-backed [`scoreboard_common::ScoreStore`] and change-channel listener.
//!
//! Pairs a [`PgScoreStore`] (CRUD + best-score upsert against the `scores` table) with a
//! [`PgChangeListener`] (dedicated `LISTEN`/`NOTIFY` connections onto `scores_changes`). Both are
//! built from the same connection string; a deployment typically constructs one of each against
//! the same database.

#![warn(missing_docs)]

mod change_listener;
mod error;
mod pool;
mod schema;
mod store;

pub use change_listener::{PgChangeConnection, PgChangeListener};
pub use store::{PgScoreStore, DEFAULT_CHECKOUT_TIMEOUT, DEFAULT_POOL_SIZE};
