//! The daily-summary CAS claim, keyed by (chat, local calendar date).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use taskdeck_core::types::ClaimOutcome;

use crate::error::Result;
use crate::tasks::ts;

/// Atomic claim on the (chat, local date) summary slot.
///
/// `INSERT OR IGNORE` against the primary key is the compare-and-set: the
/// first caller inserts the row and wins; everyone else changes nothing.
pub fn claim_summary(
    conn: &Connection,
    chat_id: i64,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<ClaimOutcome> {
    let n = conn.execute(
        "INSERT INTO summary_log (chat_id, date, delivered_utc)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (chat_id, date) DO NOTHING",
        params![chat_id, date.to_string(), ts(now)],
    )?;
    Ok(if n == 1 {
        ClaimOutcome::Claimed
    } else {
        ClaimOutcome::AlreadyClaimed
    })
}

/// Whether a summary was already delivered for (chat, local date).
pub fn summary_delivered(conn: &Connection, chat_id: i64, date: NaiveDate) -> Result<bool> {
    let mut stmt =
        conn.prepare_cached("SELECT 1 FROM summary_log WHERE chat_id = ?1 AND date = ?2")?;
    Ok(stmt.exists(params![chat_id, date.to_string()])?)
}
