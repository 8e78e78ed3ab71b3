//! Telegram message handler registered in the teloxide Dispatcher.
//!
//! Every incoming message is either a slash command or a task capture
//! attempt: deterministic "HH:MM DD.MM text" parsing first, then the AI
//! extraction oracle when one is configured.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use teloxide::prelude::*;
use tracing::warn;

use taskdeck_core::types::{ChatSettings, NewTask};
use taskdeck_core::{clock, format, parse};

use crate::commands::{self, Command, HELP_TEXT};
use crate::context::TelegramContext;
use crate::send::send_plain;

const WELCOME: &str = "Hi! Send me a task and I'll remind you before it starts.";
const CAPTURE_MISS: &str = "I couldn't find a task in that.\n\n\
Try \"/add HH:MM DD.MM text\" or describe what you need to do and when.";
const STORE_DOWN: &str = "Something went wrong on my side, please try again.";

pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<TelegramContext>) -> ResponseResult<()> {
    // Ignore other bots and non-text updates.
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let settings = match ctx.settings_for(chat_id.0) {
        Ok(s) => s,
        Err(e) => {
            warn!(chat_id = chat_id.0, error = %e, "settings lookup failed");
            send_plain(&bot, chat_id, STORE_DOWN).await;
            return Ok(());
        }
    };
    let tz = clock::resolve_tz(&settings.tz).unwrap_or(ctx.defaults.tz);
    let now = Utc::now();

    match commands::parse_command(text) {
        Some(Command::Start) => {
            // Registering the chat also enrols it for daily summaries.
            if let Err(e) = ctx.store.upsert_chat_settings(&settings) {
                warn!(chat_id = chat_id.0, error = %e, "chat registration failed");
                send_plain(&bot, chat_id, STORE_DOWN).await;
                return Ok(());
            }
            track(&ctx, chat_id.0, "bot_started", json!({}));
            send_plain(&bot, chat_id, &format!("{WELCOME}\n\n{HELP_TEXT}")).await;
        }
        Some(Command::Add(args)) => {
            match parse::parse_task_input(&args, tz, now) {
                Some((due, task_text)) => {
                    let reply = save_task(&ctx, chat_id.0, task_text, due, tz, "command").await;
                    send_plain(&bot, chat_id, &reply).await;
                }
                None => send_plain(&bot, chat_id, CAPTURE_MISS).await,
            }
        }
        Some(Command::Today) => {
            let date = clock::local_day(now, tz);
            send_plain(&bot, chat_id, &day_reply(&ctx, chat_id.0, date, tz)).await;
        }
        Some(Command::On(args)) => match date_for_on(&args, tz, now) {
            Some(date) => send_plain(&bot, chat_id, &day_reply(&ctx, chat_id.0, date, tz)).await,
            None => send_plain(&bot, chat_id, "Which date? Use /on DD.MM").await,
        },
        Some(Command::Daily(args)) => {
            let reply = set_daily(&ctx, &settings, &args);
            send_plain(&bot, chat_id, &reply).await;
        }
        Some(Command::Tz(args)) => {
            let reply = set_tz(&ctx, &settings, &args);
            send_plain(&bot, chat_id, &reply).await;
        }
        Some(Command::Help) | Some(Command::Unknown(_)) => {
            send_plain(&bot, chat_id, HELP_TEXT).await;
        }
        None => {
            // Plain message: deterministic capture, then the oracle.
            if let Some((due, task_text)) = parse::parse_task_input(text, tz, now) {
                let reply = save_task(&ctx, chat_id.0, task_text, due, tz, "parsed").await;
                send_plain(&bot, chat_id, &reply).await;
                return Ok(());
            }
            let Some(extractor) = ctx.extractor.clone() else {
                send_plain(&bot, chat_id, CAPTURE_MISS).await;
                return Ok(());
            };
            // The oracle round-trip can take seconds; keep the
            // dispatcher free in the meantime.
            let ctx2 = Arc::clone(&ctx);
            let bot2 = bot.clone();
            let text2 = text.to_string();
            let tz_name = settings.tz.clone();
            tokio::spawn(async move {
                match extractor.extract(&text2, &tz_name, now).await {
                    Ok(Some(found)) => {
                        let reply =
                            save_task(&ctx2, chat_id.0, found.title, found.due_utc, tz, "ai").await;
                        send_plain(&bot2, chat_id, &reply).await;
                    }
                    Ok(None) => send_plain(&bot2, chat_id, CAPTURE_MISS).await,
                    Err(e) => {
                        warn!(chat_id = chat_id.0, error = %e, "task extraction failed");
                        send_plain(&bot2, chat_id, CAPTURE_MISS).await;
                    }
                }
            });
        }
    }

    Ok(())
}

/// Store a captured task and build the confirmation reply.
async fn save_task(
    ctx: &TelegramContext,
    chat_id: i64,
    text: String,
    due_utc: DateTime<Utc>,
    tz: Tz,
    source: &str,
) -> String {
    let new = NewTask {
        chat_id,
        text,
        due_utc,
        remind_at_utc: clock::reminder_instant(due_utc, ctx.defaults.remind_minutes),
    };
    match ctx.store.add_task(&new, Utc::now()) {
        Ok(task) => {
            track(ctx, chat_id, "task_created", json!({ "source": source, "task_id": task.id }));
            format!(
                "✅ Saved: {} at {}",
                task.text,
                task.due_utc.with_timezone(&tz).format("%H:%M %d.%m")
            )
        }
        Err(e) => {
            warn!(chat_id, error = %e, "task insert failed");
            STORE_DOWN.to_string()
        }
    }
}

fn day_reply(ctx: &TelegramContext, chat_id: i64, date: NaiveDate, tz: Tz) -> String {
    match ctx.store.tasks_for_local_date(chat_id, date, tz) {
        Ok(tasks) => format!("{}:\n{}", date.format("%d.%m"), format::task_list(&tasks, tz)),
        Err(e) => {
            warn!(chat_id, error = %e, "task listing failed");
            STORE_DOWN.to_string()
        }
    }
}

/// "/on DD.MM" target date: this year, or next year once the day has
/// passed locally.
fn date_for_on(args: &str, tz: Tz, now: DateTime<Utc>) -> Option<NaiveDate> {
    let (day, month) = parse::parse_ddmm(args.trim())?;
    let today = clock::local_day(now, tz);
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

fn set_daily(ctx: &TelegramContext, settings: &ChatSettings, args: &str) -> String {
    if args.trim().is_empty() {
        return format!(
            "Daily summary comes at {:02}:{:02}. Change it with /daily HH:MM",
            settings.daily_hour, settings.daily_minute
        );
    }
    let Some((hour, minute)) = parse::parse_hhmm(args.trim()) else {
        return "That's not a time I recognise. Use /daily HH:MM".to_string();
    };
    let updated = ChatSettings {
        daily_hour: hour as u8,
        daily_minute: minute as u8,
        ..settings.clone()
    };
    match ctx.store.upsert_chat_settings(&updated) {
        Ok(()) => format!("Got it — daily summary at {hour:02}:{minute:02}."),
        Err(e) => {
            warn!(chat_id = settings.chat_id, error = %e, "daily slot update failed");
            STORE_DOWN.to_string()
        }
    }
}

fn set_tz(ctx: &TelegramContext, settings: &ChatSettings, args: &str) -> String {
    let name = args.trim();
    let Ok(tz) = clock::resolve_tz(name) else {
        return "Unknown timezone. Use an IANA name like Europe/Rome or America/New_York."
            .to_string();
    };
    let updated = ChatSettings {
        tz: tz.name().to_string(),
        ..settings.clone()
    };
    match ctx.store.upsert_chat_settings(&updated) {
        Ok(()) => format!("Timezone set to {}.", tz.name()),
        Err(e) => {
            warn!(chat_id = settings.chat_id, error = %e, "timezone update failed");
            STORE_DOWN.to_string()
        }
    }
}

fn track(ctx: &TelegramContext, chat_id: i64, event: &str, properties: serde_json::Value) {
    if let Some(analytics) = &ctx.analytics {
        analytics.track_detached(chat_id, event, properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_store::TaskStore;

    fn rome() -> Tz {
        "Europe/Rome".parse().unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn ctx() -> TelegramContext {
        TelegramContext {
            store: TaskStore::open_in_memory().unwrap(),
            extractor: None,
            analytics: None,
            defaults: crate::context::ChatDefaults {
                tz: rome(),
                summary_hour: 8,
                summary_minute: 0,
                remind_minutes: 30,
            },
        }
    }

    #[test]
    fn on_date_stays_in_current_year() {
        let date = date_for_on("24.12", rome(), utc("2025-08-15T10:00:00Z"));
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2025, 12, 24).unwrap()));
    }

    #[test]
    fn on_date_rolls_past_days_to_next_year() {
        let date = date_for_on("01.03", rome(), utc("2025-08-15T10:00:00Z"));
        assert_eq!(date, Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
    }

    #[test]
    fn on_date_rejects_garbage() {
        assert_eq!(date_for_on("tomorrow", rome(), utc("2025-08-15T10:00:00Z")), None);
        assert_eq!(date_for_on("32.01", rome(), utc("2025-08-15T10:00:00Z")), None);
    }

    #[tokio::test]
    async fn save_task_stores_and_confirms_in_local_time() {
        let ctx = ctx();
        let reply = save_task(
            &ctx,
            42,
            "Buy the tree".to_string(),
            utc("2025-12-24T14:30:00Z"),
            rome(),
            "parsed",
        )
        .await;
        // 14:30 UTC = 15:30 CET in December.
        assert_eq!(reply, "✅ Saved: Buy the tree at 15:30 24.12");

        let date = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();
        let tasks = ctx.store.tasks_for_local_date(42, date, rome()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].remind_at_utc, utc("2025-12-24T14:00:00Z"));
    }

    #[test]
    fn daily_without_args_reports_current_slot() {
        let ctx = ctx();
        let settings = ctx.settings_for(42).unwrap();
        let reply = set_daily(&ctx, &settings, "");
        assert!(reply.contains("08:00"));
    }

    #[test]
    fn daily_updates_slot() {
        let ctx = ctx();
        let settings = ctx.settings_for(42).unwrap();
        let reply = set_daily(&ctx, &settings, "09:15");
        assert_eq!(reply, "Got it — daily summary at 09:15.");
        let stored = ctx.store.chat_settings(42).unwrap().unwrap();
        assert_eq!((stored.daily_hour, stored.daily_minute), (9, 15));
    }

    #[test]
    fn tz_rejects_unknown_names() {
        let ctx = ctx();
        let settings = ctx.settings_for(42).unwrap();
        let reply = set_tz(&ctx, &settings, "Middle/Nowhere");
        assert!(reply.starts_with("Unknown timezone"));
        assert!(ctx.store.chat_settings(42).unwrap().is_none());
    }

    #[test]
    fn tz_updates_settings() {
        let ctx = ctx();
        let settings = ctx.settings_for(42).unwrap();
        let reply = set_tz(&ctx, &settings, "America/New_York");
        assert_eq!(reply, "Timezone set to America/New_York.");
        let stored = ctx.store.chat_settings(42).unwrap().unwrap();
        assert_eq!(stored.tz, "America/New_York");
    }
}
