//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop until the process exits. Long polling — no public URL required.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::info;

use crate::context::TelegramContext;
use crate::handler::handle_message;

pub struct TelegramAdapter {
    bot: Bot,
    ctx: Arc<TelegramContext>,
}

impl TelegramAdapter {
    pub fn new(bot: Bot, ctx: Arc<TelegramContext>) -> Self {
        Self { bot, ctx }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        info!("telegram: starting long-polling dispatcher");

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.ctx])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
