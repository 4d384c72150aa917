//! External collaborator seams: membership oracle and notifier.
//!
//! The core never talks to the messaging platform directly. Verification and
//! retention audits go through [`MembershipOracle`]; clawback notices go
//! through [`Notifier`]. Both are network-backed in production
//! ([`crate::telegram::TelegramClient`]) and faked in tests.

use crate::errors::Result;
use async_trait::async_trait;

/// A definite answer from the membership oracle.
///
/// Unavailability is deliberately *not* a variant: an oracle that cannot
/// answer returns [`crate::errors::Error::OracleUnavailable`], so callers can
/// never mistake "could not ask" for "asked and got no".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Membership {
    /// The identity currently belongs to the channel
    Member,
    /// The identity does not belong to the channel
    NotMember,
}

/// Answers whether an external identity currently belongs to a channel.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Checks membership of `telegram_id` in `channel`. Must complete within
    /// a bounded time; a timeout is an `OracleUnavailable` error, never a
    /// negative answer.
    async fn is_member(&self, channel: &str, telegram_id: &str) -> Result<Membership>;
}

/// Delivers a message to an external identity, best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` to `telegram_id`. Callers treat failures as
    /// fire-and-forget: log and move on, never roll back ledger state.
    async fn send(&self, telegram_id: &str, text: &str) -> Result<()>;
}

/// Ensures a channel handle carries its `@` prefix.
#[must_use]
pub fn normalize_channel(channel: &str) -> String {
    let trimmed = channel.trim();
    if trimmed.starts_with('@') {
        trimmed.to_string()
    } else {
        format!("@{trimmed}")
    }
}

/// Compares two channel handles ignoring case and the optional `@` prefix.
#[must_use]
pub fn is_same_channel(a: &str, b: &str) -> bool {
    normalize_channel(a).eq_ignore_ascii_case(&normalize_channel(b))
}
