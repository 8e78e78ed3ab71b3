//! Stored Google OAuth credentials (written by the external consent flow).

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use taskdeck_core::types::GoogleTokens;

use crate::error::Result;
use crate::tasks::ts;

pub fn google_tokens(conn: &Connection, chat_id: i64) -> Result<Option<GoogleTokens>> {
    let mut stmt = conn
        .prepare_cached("SELECT access_token, refresh_token FROM google_tokens WHERE chat_id = ?1")?;
    let row = stmt
        .query_row([chat_id], |row| {
            Ok(GoogleTokens {
                access_token: row.get(0)?,
                refresh_token: row.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn set_google_tokens(
    conn: &Connection,
    chat_id: i64,
    tokens: &GoogleTokens,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO google_tokens (chat_id, access_token, refresh_token, updated_utc)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (chat_id) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = excluded.refresh_token,
             updated_utc = excluded.updated_utc",
        params![chat_id, tokens.access_token, tokens.refresh_token, ts(now)],
    )?;
    Ok(())
}

/// Persist a refreshed access token after a 401 round-trip.
pub fn update_access_token(
    conn: &Connection,
    chat_id: i64,
    access_token: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE google_tokens SET access_token = ?2, updated_utc = ?3 WHERE chat_id = ?1",
        params![chat_id, access_token, ts(now)],
    )?;
    Ok(())
}
