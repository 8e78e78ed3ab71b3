use rusqlite::Connection;

use crate::error::Result;

/// Initialise the Taskdeck schema in `conn`.
///
/// Idempotent. `reminder_sent` and the `summary_log` primary key are the two
/// durable delivery-state flags the CAS claims operate on; the partial index
/// keeps the per-tick polling query cheap with thousands of tasks.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id           INTEGER NOT NULL,
            text              TEXT    NOT NULL,
            due_utc           TEXT    NOT NULL,   -- RFC 3339, Z suffix
            remind_at_utc     TEXT    NOT NULL,   -- due minus lead time
            reminder_sent     INTEGER NOT NULL DEFAULT 0,
            calendar_event_id TEXT,
            done              INTEGER NOT NULL DEFAULT 0,
            created_utc       TEXT    NOT NULL
        ) STRICT;

        -- Polling: SELECT ... WHERE reminder_sent = 0 AND remind_at_utc < ?
        CREATE INDEX IF NOT EXISTS idx_tasks_remind
            ON tasks (remind_at_utc) WHERE reminder_sent = 0;
        CREATE INDEX IF NOT EXISTS idx_tasks_chat_due ON tasks (chat_id, due_utc);

        CREATE TABLE IF NOT EXISTS settings (
            chat_id      INTEGER PRIMARY KEY,
            tz           TEXT    NOT NULL,
            daily_hour   INTEGER NOT NULL,
            daily_minute INTEGER NOT NULL
        ) STRICT;

        -- One row per delivered (chat, local date) summary. The primary key
        -- IS the dedup: INSERT OR IGNORE is the claim.
        CREATE TABLE IF NOT EXISTS summary_log (
            chat_id       INTEGER NOT NULL,
            date          TEXT    NOT NULL,   -- local calendar date, ISO
            delivered_utc TEXT    NOT NULL,
            PRIMARY KEY (chat_id, date)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS google_tokens (
            chat_id       INTEGER PRIMARY KEY,
            access_token  TEXT    NOT NULL,
            refresh_token TEXT    NOT NULL,
            updated_utc   TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
