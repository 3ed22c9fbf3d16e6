//! Streaming fan-out core for the real-time leaderboard service.
//!
//! Wires three independently testable pieces around a [`scoreboard_common::ScoreStore`]:
//! [`Service`] (validation + best-score semantics), [`ChangeSource`] (turns the store's change
//! channel into a resilient in-process stream), and [`Broadcaster`] (fans that stream out to
//! every live [`subscription::run`]). None of this crate knows about wire formats; that's a
//! transport layer built on top.

#![warn(missing_docs)]

pub mod broadcaster;
pub mod change_source;
pub mod service;
pub mod subscription;

pub use broadcaster::{Broadcaster, MailboxHandle, SubscriberId, DEFAULT_MAILBOX_CAPACITY};
pub use change_source::ChangeSource;
pub use service::{RankedEntry, Service, SubmitOutcome};
pub use subscription::{SubscriptionState, UpdateSink};
