//! The periodic tick loop that turns stored tasks into deliveries.
//!
//! Each tick scans the half-open window `[last_window_end, now)` for
//! reminders and checks every chat's summary slot. A delivery is only
//! handed to the dispatcher after the store claim for it succeeded, so
//! restarting mid-tick or racing another engine cannot double-send.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use taskdeck_core::clock;
use taskdeck_core::format;
use taskdeck_store::TaskStore;

use crate::dispatch::Dispatcher;
use crate::error::Result;

/// Static knobs for the engine loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tick: Duration,
    /// Fallback when a chat's stored timezone no longer parses.
    pub default_tz: Tz,
    pub reminders_enabled: bool,
}

pub struct SchedulerEngine {
    store: TaskStore,
    dispatcher: Dispatcher,
    config: EngineConfig,
    /// Exclusive end of the last scanned reminder window.
    last_window_end: DateTime<Utc>,
}

impl SchedulerEngine {
    pub fn new(store: TaskStore, dispatcher: Dispatcher, config: EngineConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
            last_window_end: Utc::now(),
        }
    }

    /// Move the start of the next reminder window. `run` uses this to
    /// open a catch-up window after the boot sweep; tests use it to
    /// drive deterministic windows.
    pub fn rewind_window(&mut self, to: DateTime<Utc>) {
        self.last_window_end = to;
    }

    /// Run ticks until `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let now = Utc::now();
        let grace = chrono::Duration::minutes(10)
            + chrono::Duration::from_std(self.config.tick * 2)
                .unwrap_or_else(|_| chrono::Duration::zero());
        match self.store.mark_stale_reminders_missed(now - grace) {
            Ok(0) => {}
            Ok(n) => info!(count = n, "wrote off reminders missed while down"),
            Err(e) => error!(error = %e, "stale reminder sweep failed"),
        }
        self.rewind_window(now - grace);

        info!(tick_secs = self.config.tick.as_secs(), "scheduler engine started");
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "tick skipped on store failure");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One pass over due reminders and summary slots at instant `now`.
    ///
    /// Store errors abort the pass; the un-scanned window is retried
    /// wholesale next tick. Already-claimed work stays claimed.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        let mut deliveries = JoinSet::new();

        if self.config.reminders_enabled && now > self.last_window_end {
            for task in self.store.due_reminders(self.last_window_end, now)? {
                match self.store.claim_reminder(task.id)? {
                    outcome if outcome.won() => {
                        let tz = self.chat_tz(task.chat_id)?;
                        let dispatcher = self.dispatcher.clone();
                        deliveries.spawn(dispatcher.deliver_reminder(task, tz));
                    }
                    _ => debug!(task_id = task.id, "reminder already claimed elsewhere"),
                }
            }
        }
        if now > self.last_window_end {
            self.last_window_end = now;
        }

        for settings in self.store.all_chat_settings()? {
            let tz = self.parse_tz(&settings.tz);
            if !clock::summary_due(now, tz, settings.daily_hour, settings.daily_minute) {
                continue;
            }
            let date = clock::local_day(now, tz);
            if !self.store.claim_summary(settings.chat_id, date, now)?.won() {
                debug!(chat_id = settings.chat_id, %date, "summary already claimed");
                continue;
            }
            let tasks = self.store.tasks_for_local_date(settings.chat_id, date, tz)?;
            let text = format::summary_text(date, &tasks, tz);
            let dispatcher = self.dispatcher.clone();
            deliveries.spawn(dispatcher.deliver_summary(settings.chat_id, date, text));
        }

        while deliveries.join_next().await.is_some() {}
        Ok(())
    }

    fn chat_tz(&self, chat_id: i64) -> Result<Tz> {
        Ok(match self.store.chat_settings(chat_id)? {
            Some(s) => self.parse_tz(&s.tz),
            None => self.config.default_tz,
        })
    }

    fn parse_tz(&self, name: &str) -> Tz {
        clock::resolve_tz(name).unwrap_or_else(|_| {
            warn!(tz = name, "stored timezone no longer parses, using default");
            self.config.default_tz
        })
    }
}
