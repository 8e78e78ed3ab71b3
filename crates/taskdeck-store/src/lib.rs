//! `taskdeck-store` — SQLite persistence for tasks, settings and delivery state.
//!
//! # Overview
//!
//! The store owns the durable truth about what was delivered. The two claim
//! operations ([`TaskStore::claim_reminder`], [`TaskStore::claim_summary`])
//! are atomic set-if-unset updates; they — not process coordination — are
//! what keeps delivery at-most-once when several instances race.
//!
//! Scheduling state is never cached here across restarts: every engine tick
//! re-derives due work from these tables, which is what makes the scheduler
//! crash-safe.

pub mod db;
pub mod error;
pub mod settings;
pub mod summaries;
pub mod tasks;
pub mod tokens;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;

use taskdeck_core::clock;
use taskdeck_core::types::{ChatSettings, ClaimOutcome, GoogleTokens, NewTask, Task};

pub use error::{Result, StoreError};

/// Shared handle over one SQLite connection.
///
/// Cheap to clone; the Telegram handlers and the scheduler engine typically
/// each get their own `TaskStore` over separate connections to the same file
/// so they never contend on the mutex.
#[derive(Clone)]
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl TaskStore {
    /// Wrap an open connection, running migrations first.
    pub fn new(conn: Connection) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open (or create) the database file with WAL enabled.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn add_task(&self, new: &NewTask, now: DateTime<Utc>) -> Result<Task> {
        tasks::insert_task(&self.conn.lock().unwrap(), new, now)
    }

    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        tasks::get_task(&self.conn.lock().unwrap(), task_id)
    }

    pub fn due_reminders(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Task>> {
        tasks::due_reminders(&self.conn.lock().unwrap(), start, end)
    }

    pub fn claim_reminder(&self, task_id: i64) -> Result<ClaimOutcome> {
        tasks::claim_reminder(&self.conn.lock().unwrap(), task_id)
    }

    pub fn mark_stale_reminders_missed(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        tasks::mark_stale_reminders_missed(&self.conn.lock().unwrap(), cutoff)
    }

    /// Open tasks due on the chat's local calendar date.
    pub fn tasks_for_local_date(
        &self,
        chat_id: i64,
        date: NaiveDate,
        tz: Tz,
    ) -> Result<Vec<Task>> {
        let (start, end) = clock::local_day_bounds(date, tz);
        tasks::tasks_in_range(&self.conn.lock().unwrap(), chat_id, start, end)
    }

    pub fn set_calendar_event(&self, task_id: i64, event_id: &str) -> Result<()> {
        tasks::set_calendar_event(&self.conn.lock().unwrap(), task_id, event_id)
    }

    pub fn claim_summary(
        &self,
        chat_id: i64,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome> {
        summaries::claim_summary(&self.conn.lock().unwrap(), chat_id, date, now)
    }

    pub fn summary_delivered(&self, chat_id: i64, date: NaiveDate) -> Result<bool> {
        summaries::summary_delivered(&self.conn.lock().unwrap(), chat_id, date)
    }

    pub fn chat_settings(&self, chat_id: i64) -> Result<Option<ChatSettings>> {
        settings::chat_settings(&self.conn.lock().unwrap(), chat_id)
    }

    pub fn upsert_chat_settings(&self, s: &ChatSettings) -> Result<()> {
        settings::upsert_chat_settings(&self.conn.lock().unwrap(), s)
    }

    pub fn all_chat_settings(&self) -> Result<Vec<ChatSettings>> {
        settings::all_chat_settings(&self.conn.lock().unwrap())
    }

    pub fn google_tokens(&self, chat_id: i64) -> Result<Option<GoogleTokens>> {
        tokens::google_tokens(&self.conn.lock().unwrap(), chat_id)
    }

    pub fn set_google_tokens(
        &self,
        chat_id: i64,
        t: &GoogleTokens,
        now: DateTime<Utc>,
    ) -> Result<()> {
        tokens::set_google_tokens(&self.conn.lock().unwrap(), chat_id, t, now)
    }

    pub fn update_access_token(
        &self,
        chat_id: i64,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        tokens::update_access_token(&self.conn.lock().unwrap(), chat_id, access_token, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_core::clock::resolve_tz;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn new_task(chat_id: i64, due: &str, remind: &str) -> NewTask {
        NewTask {
            chat_id,
            text: "Call mum".to_string(),
            due_utc: utc(due),
            remind_at_utc: utc(remind),
        }
    }

    fn store_with_task() -> (TaskStore, Task) {
        let store = TaskStore::open_in_memory().unwrap();
        let task = store
            .add_task(
                &new_task(42, "2025-08-15T14:00:00Z", "2025-08-15T13:30:00Z"),
                utc("2025-08-01T10:00:00Z"),
            )
            .unwrap();
        (store, task)
    }

    #[test]
    fn claim_reminder_is_idempotent() {
        let (store, task) = store_with_task();
        assert_eq!(store.claim_reminder(task.id).unwrap(), ClaimOutcome::Claimed);
        // Second call must report "already set", never error.
        assert_eq!(
            store.claim_reminder(task.id).unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert!(store.get_task(task.id).unwrap().unwrap().reminder_sent);
    }

    #[test]
    fn claim_reminder_unknown_task_is_an_error() {
        let store = TaskStore::open_in_memory().unwrap();
        assert!(matches!(
            store.claim_reminder(999),
            Err(StoreError::TaskNotFound { id: 999 })
        ));
    }

    #[test]
    fn concurrent_claims_produce_one_winner() {
        let (store, task) = store_with_task();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = task.id;
            handles.push(std::thread::spawn(move || {
                store.claim_reminder(id).unwrap()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| o.won())
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn due_reminders_window_is_half_open() {
        let (store, task) = store_with_task();
        let at = task.remind_at_utc;

        // Window ending exactly at the instant excludes it.
        let before = store.due_reminders(at - chrono::Duration::minutes(1), at).unwrap();
        assert!(before.is_empty());

        // Window starting at the instant includes it.
        let hit = store
            .due_reminders(at, at + chrono::Duration::minutes(1))
            .unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, task.id);

        // Claimed tasks drop out of the scan.
        store.claim_reminder(task.id).unwrap();
        let after = store
            .due_reminders(at, at + chrono::Duration::minutes(1))
            .unwrap();
        assert!(after.is_empty());
    }

    #[test]
    fn end_to_end_window_boundary() {
        // Task due 14:00, lead 30 min -> remind at 13:30. With a one-minute
        // cadence the [13:29, 13:30) tick misses it and [13:30, 13:31) claims.
        let (store, task) = store_with_task();
        let w1 = store
            .due_reminders(utc("2025-08-15T13:29:00Z"), utc("2025-08-15T13:30:00Z"))
            .unwrap();
        assert!(w1.is_empty());
        let w2 = store
            .due_reminders(utc("2025-08-15T13:30:00Z"), utc("2025-08-15T13:31:00Z"))
            .unwrap();
        assert_eq!(w2.len(), 1);
        assert_eq!(w2[0].id, task.id);
    }

    #[test]
    fn summary_claim_is_once_per_chat_and_date() {
        let store = TaskStore::open_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        let now = utc("2025-08-15T06:00:00Z");

        assert!(store.claim_summary(42, date, now).unwrap().won());
        assert!(!store.claim_summary(42, date, now).unwrap().won());
        assert!(store.summary_delivered(42, date).unwrap());

        // Other chats and other dates are independent slots.
        assert!(store.claim_summary(43, date, now).unwrap().won());
        assert!(store
            .claim_summary(42, date.succ_opt().unwrap(), now)
            .unwrap()
            .won());
    }

    #[test]
    fn stale_sweep_marks_old_reminders() {
        let store = TaskStore::open_in_memory().unwrap();
        let now = utc("2025-08-15T12:00:00Z");
        store
            .add_task(&new_task(1, "2025-08-15T09:00:00Z", "2025-08-15T08:30:00Z"), now)
            .unwrap();
        let fresh = store
            .add_task(&new_task(1, "2025-08-15T14:00:00Z", "2025-08-15T13:30:00Z"), now)
            .unwrap();

        let swept = store
            .mark_stale_reminders_missed(utc("2025-08-15T11:50:00Z"))
            .unwrap();
        assert_eq!(swept, 1);

        let due = store
            .due_reminders(utc("2025-08-15T00:00:00Z"), utc("2025-08-16T00:00:00Z"))
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, fresh.id);
    }

    #[test]
    fn tasks_for_local_date_uses_local_bounds() {
        let store = TaskStore::open_in_memory().unwrap();
        let tz = resolve_tz("Europe/Rome").unwrap();
        let now = utc("2025-08-01T10:00:00Z");
        // 23:00 UTC Aug 15 = 01:00 local Aug 16.
        store
            .add_task(&new_task(7, "2025-08-15T23:00:00Z", "2025-08-15T22:30:00Z"), now)
            .unwrap();

        let aug15 = store
            .tasks_for_local_date(7, NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(), tz)
            .unwrap();
        assert!(aug15.is_empty());

        let aug16 = store
            .tasks_for_local_date(7, NaiveDate::from_ymd_opt(2025, 8, 16).unwrap(), tz)
            .unwrap();
        assert_eq!(aug16.len(), 1);
    }

    #[test]
    fn settings_roundtrip_and_upsert() {
        let store = TaskStore::open_in_memory().unwrap();
        assert!(store.chat_settings(42).unwrap().is_none());

        let s = ChatSettings {
            chat_id: 42,
            tz: "Europe/Rome".to_string(),
            daily_hour: 8,
            daily_minute: 0,
        };
        store.upsert_chat_settings(&s).unwrap();
        assert_eq!(store.chat_settings(42).unwrap().unwrap().daily_hour, 8);

        let updated = ChatSettings {
            daily_hour: 9,
            daily_minute: 30,
            ..s
        };
        store.upsert_chat_settings(&updated).unwrap();
        let got = store.chat_settings(42).unwrap().unwrap();
        assert_eq!((got.daily_hour, got.daily_minute), (9, 30));
        assert_eq!(store.all_chat_settings().unwrap().len(), 1);
    }

    #[test]
    fn calendar_event_id_first_writer_wins() {
        let (store, task) = store_with_task();
        store.set_calendar_event(task.id, "evt-1").unwrap();
        store.set_calendar_event(task.id, "evt-2").unwrap();
        assert_eq!(
            store.get_task(task.id).unwrap().unwrap().calendar_event_id,
            Some("evt-1".to_string())
        );
    }

    #[test]
    fn google_tokens_roundtrip() {
        let store = TaskStore::open_in_memory().unwrap();
        let now = utc("2025-08-15T12:00:00Z");
        assert!(store.google_tokens(42).unwrap().is_none());

        let t = GoogleTokens {
            access_token: "at-1".to_string(),
            refresh_token: "rt-1".to_string(),
        };
        store.set_google_tokens(42, &t, now).unwrap();
        assert_eq!(store.google_tokens(42).unwrap().unwrap().access_token, "at-1");

        store.update_access_token(42, "at-2", now).unwrap();
        let got = store.google_tokens(42).unwrap().unwrap();
        assert_eq!(got.access_token, "at-2");
        assert_eq!(got.refresh_token, "rt-1");
    }
}
