use std::sync::Arc;
use std::time::Duration;

use teloxide::Bot;
use tracing::info;

use taskdeck_ai::{OpenAiExtractor, TaskExtractor};
use taskdeck_analytics::AnalyticsClient;
use taskdeck_calendar::CalendarClient;
use taskdeck_core::clock;
use taskdeck_core::config::BotConfig;
use taskdeck_core::delivery::Messenger;
use taskdeck_scheduler::{
    resolve_role, DispatchPolicy, Dispatcher, EngineConfig, SchedulerEngine,
};
use taskdeck_store::TaskStore;
use taskdeck_telegram::{ChatDefaults, TelegramAdapter, TelegramContext, TelegramMessenger};

/// Concurrent proactive sends allowed at once.
const MAX_IN_FLIGHT: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskdeck=info".into()),
        )
        .init();

    // load config: TASKDECK_CONFIG env > taskdeck.toml > env vars
    let config_path = std::env::var("TASKDECK_CONFIG").ok();
    let config = BotConfig::load(config_path.as_deref())?;
    config.validate()?;
    // a broken default timezone should stop the process, not every tick
    let default_tz = clock::resolve_tz(&config.default_tz)?;

    ensure_parent_dir(&config.db_path);
    info!(path = %config.db_path, "opening SQLite database");
    // separate connections so chat handlers and the engine never
    // contend on one mutex
    let handler_store = TaskStore::open(&config.db_path)?;
    let engine_store = TaskStore::open(&config.db_path)?;

    let siblings = config.siblings().unwrap_or_default();
    let role = resolve_role(
        config.instance_id.as_deref(),
        config.primary_instance_id.as_deref(),
        config.instance_preferred.as_deref(),
        &siblings,
    );
    info!(
        ?role,
        instance = config.instance_id.as_deref().unwrap_or("unknown"),
        "instance role resolved"
    );

    let bot = Bot::new(&config.bot_token);
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let analytics = AnalyticsClient::from_key(config.amplitude_api_key.clone());
    let calendar = CalendarClient::from_config(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let extractor: Option<Arc<dyn TaskExtractor>> = config.openai_api_key.clone().map(|key| {
        Arc::new(OpenAiExtractor::new(
            key,
            config.openai_base_url.clone(),
            config.openai_model.clone(),
        )) as Arc<dyn TaskExtractor>
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    if role.is_leader() {
        let dispatcher = Dispatcher::new(
            messenger,
            analytics.clone(),
            calendar,
            engine_store.clone(),
            MAX_IN_FLIGHT,
            DispatchPolicy::default(),
        );
        let engine = SchedulerEngine::new(
            engine_store,
            dispatcher,
            EngineConfig {
                tick: Duration::from_secs(config.tick_secs),
                default_tz,
                reminders_enabled: config.reminders_enabled,
            },
        );
        tokio::spawn(engine.run(shutdown_rx));
    } else {
        info!("standing by, scheduler engine stays off");
    }

    let ctx = Arc::new(TelegramContext {
        store: handler_store,
        extractor,
        analytics,
        defaults: ChatDefaults {
            tz: default_tz,
            summary_hour: config.summary_hour,
            summary_minute: config.summary_minute,
            remind_minutes: config.remind_minutes,
        },
    });
    TelegramAdapter::new(bot, ctx).run().await;

    let _ = shutdown_tx.send(true);
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
