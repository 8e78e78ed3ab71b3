//! Outbound delivery with bounded concurrency and bounded retries.
//!
//! Everything here runs AFTER a store claim succeeded, so a delivery
//! that ultimately fails is dropped, not re-queued. That keeps the
//! at-most-once guarantee: a claimed reminder is never unclaimed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use taskdeck_analytics::AnalyticsClient;
use taskdeck_calendar::{CalendarClient, CalendarError};
use taskdeck_core::delivery::Messenger;
use taskdeck_core::format;
use taskdeck_core::types::Task;
use taskdeck_store::TaskStore;

/// Retry behaviour for a single delivery.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Sends claimed deliveries out through the messenger.
///
/// Cloneable so the engine can spawn one send per claimed item; a shared
/// semaphore caps how many sends are in flight at once.
#[derive(Clone)]
pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    analytics: Option<Arc<AnalyticsClient>>,
    calendar: Option<Arc<CalendarClient>>,
    store: TaskStore,
    permits: Arc<Semaphore>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        analytics: Option<Arc<AnalyticsClient>>,
        calendar: Option<Arc<CalendarClient>>,
        store: TaskStore,
        max_in_flight: usize,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            messenger,
            analytics,
            calendar,
            store,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            policy,
        }
    }

    /// Deliver one claimed reminder, then best-effort side work
    /// (analytics event, calendar mirror).
    pub async fn deliver_reminder(self, task: Task, tz: Tz) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };
        let text = format::reminder_text(&task, tz);
        let sent = self.send_with_retry(task.chat_id, &text).await;
        if sent {
            if let Some(analytics) = &self.analytics {
                analytics.track_detached(
                    task.chat_id,
                    "reminder_sent",
                    json!({ "task_id": task.id }),
                );
            }
        }
        self.mirror_to_calendar(&task, tz).await;
    }

    /// Deliver one claimed daily summary.
    pub async fn deliver_summary(self, chat_id: i64, date: NaiveDate, text: String) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };
        let sent = self.send_with_retry(chat_id, &text).await;
        if sent {
            if let Some(analytics) = &self.analytics {
                analytics.track_detached(
                    chat_id,
                    "summary_sent",
                    json!({ "date": date.to_string() }),
                );
            }
        }
    }

    /// Retries transient failures with exponential backoff; gives up on
    /// the first permanent failure. Returns whether the send landed.
    async fn send_with_retry(&self, chat_id: i64, text: &str) -> bool {
        for attempt in 1..=self.policy.max_attempts {
            match self.messenger.send(chat_id, text).await {
                Ok(()) => {
                    debug!(chat_id, attempt, "delivery sent");
                    return true;
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    // 200ms, 400ms, 800ms... doubling per attempt.
                    let delay = self.policy.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(chat_id, attempt, error = %e, "transient send failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(chat_id, attempt, error = %e, "delivery dropped after claim");
                    return false;
                }
            }
        }
        false
    }

    /// Mirrors the task into the user's Google calendar exactly once,
    /// keyed on the stored event id. Skipped silently when the calendar
    /// integration is off or the chat never connected an account.
    async fn mirror_to_calendar(&self, task: &Task, tz: Tz) {
        if task.calendar_event_id.is_some() {
            return;
        }
        let Some(calendar) = &self.calendar else {
            return;
        };
        let tokens = match self.store.google_tokens(task.chat_id) {
            Ok(Some(t)) => t,
            Ok(None) => return,
            Err(e) => {
                warn!(chat_id = task.chat_id, error = %e, "could not load calendar tokens");
                return;
            }
        };

        match calendar.create_event(&tokens, &task.text, task.due_utc, tz).await {
            Ok(created) => {
                if let Err(e) = self.store.set_calendar_event(task.id, &created.event_id) {
                    warn!(task_id = task.id, error = %e, "could not record calendar event id");
                }
                if let Some(access) = created.refreshed_access_token {
                    if let Err(e) =
                        self.store.update_access_token(task.chat_id, &access, Utc::now())
                    {
                        warn!(chat_id = task.chat_id, error = %e, "could not persist refreshed token");
                    }
                }
            }
            Err(CalendarError::AuthExpired) => {
                warn!(chat_id = task.chat_id, "calendar credentials expired");
                let note = "I couldn't add this to your Google calendar — please reconnect it.";
                if let Err(e) = self.messenger.send(task.chat_id, note).await {
                    debug!(chat_id = task.chat_id, error = %e, "calendar failure note not sent");
                }
            }
            Err(e) => {
                warn!(chat_id = task.chat_id, error = %e, "calendar event creation failed");
            }
        }
    }
}
