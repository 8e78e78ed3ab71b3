//! Shared state handed to every Telegram handler invocation.

use std::sync::Arc;

use chrono_tz::Tz;

use taskdeck_ai::TaskExtractor;
use taskdeck_analytics::AnalyticsClient;
use taskdeck_core::types::ChatSettings;
use taskdeck_store::TaskStore;

/// Settings applied to chats that never ran `/daily` or `/tz`.
#[derive(Debug, Clone)]
pub struct ChatDefaults {
    pub tz: Tz,
    pub summary_hour: u8,
    pub summary_minute: u8,
    /// Minutes between the reminder ping and the task's due time.
    pub remind_minutes: u32,
}

pub struct TelegramContext {
    pub store: TaskStore,
    /// Free-text fallback; `None` when no API key is configured.
    pub extractor: Option<Arc<dyn TaskExtractor>>,
    pub analytics: Option<Arc<AnalyticsClient>>,
    pub defaults: ChatDefaults,
}

impl TelegramContext {
    /// The chat's stored settings, or the deployment defaults.
    pub fn settings_for(&self, chat_id: i64) -> taskdeck_store::Result<ChatSettings> {
        Ok(self.store.chat_settings(chat_id)?.unwrap_or(ChatSettings {
            chat_id,
            tz: self.defaults.tz.name().to_string(),
            daily_hour: self.defaults.summary_hour,
            daily_minute: self.defaults.summary_minute,
        }))
    }
}
