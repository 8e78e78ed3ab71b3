//! Plain-text sending helper for the Telegram adapter.

use teloxide::prelude::*;
use tracing::warn;

/// Telegram caps messages at 4096 characters; we stay a little under.
const MESSAGE_MAX: usize = 4090;

/// Send `text` to `chat_id`, truncating at the Telegram limit. Failures
/// are logged, not propagated; a lost chat reply is not fatal.
pub async fn send_plain(bot: &Bot, chat_id: ChatId, text: &str) {
    let text = truncated(text);
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!(chat_id = chat_id.0, error = %e, "telegram send failed");
    }
}

fn truncated(text: &str) -> &str {
    if text.len() <= MESSAGE_MAX {
        return text;
    }
    let mut end = MESSAGE_MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
