use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// SQLite rowid — primary key.
    pub id: i64,
    /// Telegram chat the task belongs to.
    pub chat_id: i64,
    /// Free-text description as the user typed it.
    pub text: String,
    /// Absolute due instant.
    pub due_utc: DateTime<Utc>,
    /// Absolute reminder instant (`due_utc` minus the lead time).
    pub remind_at_utc: DateTime<Utc>,
    /// Set exactly once by the CAS claim; never reverts.
    pub reminder_sent: bool,
    /// External calendar event reference, once created.
    pub calendar_event_id: Option<String>,
    pub done: bool,
    pub created_utc: DateTime<Utc>,
}

/// A task about to be inserted (no id yet).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub chat_id: i64,
    pub text: String,
    pub due_utc: DateTime<Utc>,
    pub remind_at_utc: DateTime<Utc>,
}

/// Per-chat scheduling preferences, created when the chat first talks to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    pub chat_id: i64,
    /// IANA timezone name, e.g. "Europe/Rome".
    pub tz: String,
    /// Local hour of the daily summary.
    pub daily_hour: u8,
    /// Local minute of the daily summary.
    pub daily_minute: u8,
}

/// Outcome of an atomic set-if-unset claim on a delivery-state flag.
///
/// `AlreadyClaimed` is the normal result when two overlapping leaders race
/// for the same item — the loser skips, it is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
}

impl ClaimOutcome {
    /// True when this process won the claim and must dispatch the item.
    pub fn won(self) -> bool {
        matches!(self, ClaimOutcome::Claimed)
    }
}

/// Stored Google OAuth credentials for one chat.
///
/// The consent flow that produces these lives outside this codebase; we only
/// read them back, use them, and persist a refreshed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: String,
}
