use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskdeckError};

/// Env vars merged verbatim over the TOML file. Render-style deployments
/// configure everything through these; the TOML file is for local runs.
const ENV_KEYS: &[&str] = &[
    "BOT_TOKEN",
    "DB_PATH",
    "DEFAULT_TZ",
    "SUMMARY_HOUR",
    "SUMMARY_MINUTE",
    "REMIND_MINUTES",
    "REMINDERS_ENABLED",
    "TICK_SECS",
    "PRIMARY_INSTANCE_ID",
    "INSTANCE_PREFERRED",
    "INSTANCE_SIBLINGS",
    "INSTANCE_ID",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "AMPLITUDE_API_KEY",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
];

/// Top-level config (taskdeck.toml + bare env overrides).
///
/// Kept flat so the env var names match the keys one-to-one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token — the only required key.
    pub bot_token: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// IANA timezone used for chats that never set their own.
    #[serde(default = "default_tz")]
    pub default_tz: String,

    /// Default local hour:minute of the daily summary for new chats.
    #[serde(default = "default_summary_hour")]
    pub summary_hour: u8,
    #[serde(default)]
    pub summary_minute: u8,

    /// Reminder lead time before a task's due instant, in minutes.
    #[serde(default = "default_remind_minutes")]
    pub remind_minutes: u32,

    #[serde(default = "bool_true")]
    pub reminders_enabled: bool,

    /// Scheduler polling cadence in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    // ── Leadership (multi-instance deployments only) ────────────────────────
    /// When set, this process is leader iff its own instance id equals this.
    #[serde(default)]
    pub primary_instance_id: Option<String>,
    /// "min" — leader is the instance with the lowest numeric id suffix.
    #[serde(default)]
    pub instance_preferred: Option<String>,
    /// Comma-separated sibling instance ids for the "min" rule.
    #[serde(default)]
    pub instance_siblings: Option<String>,
    /// This process's own instance id. Falls back to $RENDER_INSTANCE_ID.
    #[serde(default)]
    pub instance_id: Option<String>,

    // ── External collaborators (all optional) ───────────────────────────────
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default)]
    pub amplitude_api_key: Option<String>,
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
}

fn bool_true() -> bool {
    true
}
fn default_db_path() -> String {
    "tasks.db".to_string()
}
fn default_tz() -> String {
    "Europe/Rome".to_string()
}
fn default_summary_hour() -> u8 {
    8
}
fn default_remind_minutes() -> u32 {
    30
}
fn default_tick_secs() -> u64 {
    60
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_config_path() -> String {
    "taskdeck.toml".to_string()
}

impl BotConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// Env always wins over the file. A missing file is fine as long as
    /// `BOT_TOKEN` is in the environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: BotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
            .map_err(|e| TaskdeckError::Config(e.to_string()))?;

        // Render assigns every instance an id; use it when nothing explicit
        // was configured.
        if config.instance_id.is_none() {
            config.instance_id = std::env::var("RENDER_INSTANCE_ID").ok();
        }

        Ok(config)
    }

    /// Reject configs that would silently mis-schedule every user.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(TaskdeckError::Config("BOT_TOKEN is empty".into()));
        }
        if self.summary_hour > 23 {
            return Err(TaskdeckError::Config(format!(
                "SUMMARY_HOUR out of range: {}",
                self.summary_hour
            )));
        }
        if self.summary_minute > 59 {
            return Err(TaskdeckError::Config(format!(
                "SUMMARY_MINUTE out of range: {}",
                self.summary_minute
            )));
        }
        if self.tick_secs == 0 {
            return Err(TaskdeckError::Config("TICK_SECS must be >= 1".into()));
        }
        Ok(())
    }

    /// Sibling instance ids parsed from the comma-separated config value.
    pub fn siblings(&self) -> Option<Vec<String>> {
        let raw = self.instance_siblings.as_deref()?;
        let ids: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> BotConfig {
        figment::Figment::new()
            .merge(figment::providers::Serialized::defaults(serde_json::json!({
                "bot_token": "123:ABC"
            })))
            .extract()
            .unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = minimal();
        assert_eq!(cfg.default_tz, "Europe/Rome");
        assert_eq!(cfg.summary_hour, 8);
        assert_eq!(cfg.summary_minute, 0);
        assert_eq!(cfg.remind_minutes, 30);
        assert!(cfg.reminders_enabled);
        assert_eq!(cfg.tick_secs, 60);
        assert!(cfg.primary_instance_id.is_none());
    }

    #[test]
    fn validate_rejects_bad_summary_time() {
        let mut cfg = minimal();
        cfg.summary_hour = 24;
        assert!(cfg.validate().is_err());
        cfg.summary_hour = 8;
        cfg.summary_minute = 60;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn siblings_are_split_and_trimmed() {
        let mut cfg = minimal();
        cfg.instance_siblings = Some("app-1, app-2 ,app-3,".into());
        assert_eq!(
            cfg.siblings().unwrap(),
            vec!["app-1".to_string(), "app-2".into(), "app-3".into()]
        );

        cfg.instance_siblings = Some("  ".into());
        assert!(cfg.siblings().is_none());
    }
}
