//! Task queries and the reminder CAS claim.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use taskdeck_core::types::{ClaimOutcome, NewTask, Task};

use crate::error::{Result, StoreError};

/// Uniform timestamp encoding — lexicographic order must match instant order,
/// so every column goes through this one formatter.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

const TASK_COLS: &str =
    "id, chat_id, text, due_utc, remind_at_utc, reminder_sent, calendar_event_id, done, created_utc";

type TaskRow = (
    i64,
    i64,
    String,
    String,
    String,
    i64,
    Option<String>,
    i64,
    String,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn build_task(raw: TaskRow) -> Option<Task> {
    let (id, chat_id, text, due, remind, sent, event_id, done, created) = raw;
    Some(Task {
        id,
        chat_id,
        text,
        due_utc: parse_ts(&due)?,
        remind_at_utc: parse_ts(&remind)?,
        reminder_sent: sent != 0,
        calendar_event_id: event_id,
        done: done != 0,
        created_utc: parse_ts(&created)?,
    })
}

pub fn insert_task(conn: &Connection, new: &NewTask, now: DateTime<Utc>) -> Result<Task> {
    conn.execute(
        "INSERT INTO tasks (chat_id, text, due_utc, remind_at_utc, reminder_sent, done, created_utc)
         VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
        params![
            new.chat_id,
            new.text,
            ts(new.due_utc),
            ts(new.remind_at_utc),
            ts(now)
        ],
    )?;
    Ok(Task {
        id: conn.last_insert_rowid(),
        chat_id: new.chat_id,
        text: new.text.clone(),
        due_utc: new.due_utc,
        remind_at_utc: new.remind_at_utc,
        reminder_sent: false,
        calendar_event_id: None,
        done: false,
        created_utc: now,
    })
}

/// Unsent reminders whose instant falls in the half-open window `[start, end)`.
pub fn due_reminders(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLS} FROM tasks
         WHERE reminder_sent = 0 AND done = 0
           AND remind_at_utc >= ?1 AND remind_at_utc < ?2
         ORDER BY remind_at_utc"
    ))?;
    let tasks = stmt
        .query_map(params![ts(start), ts(end)], read_row)?
        .filter_map(|r| r.ok())
        .filter_map(build_task)
        .collect();
    Ok(tasks)
}

/// Atomic set-if-unset on `reminder_sent`.
///
/// The sole duplicate-prevention primitive for reminders: of any number of
/// racing callers (overlapping ticks, briefly overlapping leaders), exactly
/// one gets `Claimed`. Calling it again for a sent task is `AlreadyClaimed`,
/// never an error.
pub fn claim_reminder(conn: &Connection, task_id: i64) -> Result<ClaimOutcome> {
    let n = conn.execute(
        "UPDATE tasks SET reminder_sent = 1 WHERE id = ?1 AND reminder_sent = 0",
        [task_id],
    )?;
    if n == 1 {
        return Ok(ClaimOutcome::Claimed);
    }
    // Distinguish "already sent" from "no such task".
    let exists: Option<i64> = conn
        .query_row("SELECT id FROM tasks WHERE id = ?1", [task_id], |r| r.get(0))
        .optional()?;
    match exists {
        Some(_) => Ok(ClaimOutcome::AlreadyClaimed),
        None => Err(StoreError::TaskNotFound { id: task_id }),
    }
}

/// Startup sweep: flag reminders whose instant passed before `cutoff` as sent
/// so a long outage doesn't fire a burst of stale notifications at boot.
pub fn mark_stale_reminders_missed(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    let n = conn.execute(
        "UPDATE tasks SET reminder_sent = 1
         WHERE reminder_sent = 0 AND done = 0 AND remind_at_utc < ?1",
        [ts(cutoff)],
    )?;
    if n > 0 {
        warn!(count = n, "stale reminders marked missed on startup");
    }
    Ok(n)
}

/// Open tasks for one chat with a due instant in `[start, end)`.
pub fn tasks_in_range(
    conn: &Connection,
    chat_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLS} FROM tasks
         WHERE chat_id = ?1 AND done = 0
           AND due_utc >= ?2 AND due_utc < ?3
         ORDER BY due_utc"
    ))?;
    let tasks = stmt
        .query_map(params![chat_id, ts(start), ts(end)], read_row)?
        .filter_map(|r| r.ok())
        .filter_map(build_task)
        .collect();
    Ok(tasks)
}

pub fn get_task(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {TASK_COLS} FROM tasks WHERE id = ?1"))?;
    let raw = stmt.query_row([task_id], read_row).optional()?;
    Ok(raw.and_then(build_task))
}

/// Record the external calendar reference. First writer wins; a stored event
/// id is the idempotence key against creating the event twice.
pub fn set_calendar_event(conn: &Connection, task_id: i64, event_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET calendar_event_id = ?2
         WHERE id = ?1 AND calendar_event_id IS NULL",
        params![task_id, event_id],
    )?;
    Ok(())
}
