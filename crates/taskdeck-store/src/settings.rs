//! Per-chat scheduling preferences.

use rusqlite::{params, Connection, OptionalExtension};

use taskdeck_core::types::ChatSettings;

use crate::error::Result;

pub fn chat_settings(conn: &Connection, chat_id: i64) -> Result<Option<ChatSettings>> {
    let mut stmt = conn
        .prepare_cached("SELECT tz, daily_hour, daily_minute FROM settings WHERE chat_id = ?1")?;
    let row = stmt
        .query_row([chat_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, u8>(2)?,
            ))
        })
        .optional()?;
    Ok(row.map(|(tz, daily_hour, daily_minute)| ChatSettings {
        chat_id,
        tz,
        daily_hour,
        daily_minute,
    }))
}

pub fn upsert_chat_settings(conn: &Connection, settings: &ChatSettings) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (chat_id, tz, daily_hour, daily_minute)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (chat_id) DO UPDATE SET
             tz = excluded.tz,
             daily_hour = excluded.daily_hour,
             daily_minute = excluded.daily_minute",
        params![
            settings.chat_id,
            settings.tz,
            settings.daily_hour,
            settings.daily_minute
        ],
    )?;
    Ok(())
}

/// Every chat that has talked to the bot — the summary scan set.
pub fn all_chat_settings(conn: &Connection) -> Result<Vec<ChatSettings>> {
    let mut stmt = conn
        .prepare_cached("SELECT chat_id, tz, daily_hour, daily_minute FROM settings ORDER BY chat_id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ChatSettings {
                chat_id: row.get(0)?,
                tz: row.get(1)?,
                daily_hour: row.get(2)?,
                daily_minute: row.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}
