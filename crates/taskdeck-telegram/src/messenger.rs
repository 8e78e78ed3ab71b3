//! [`Messenger`] implementation over the teloxide `Bot`, used by the
//! scheduler's dispatcher for proactive sends.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::RequestError;

use taskdeck_core::delivery::{Messenger, SendError};

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Rate limits and transport failures are worth a retry; everything the
/// Bot API actively rejects is not.
fn classify(e: RequestError) -> SendError {
    match e {
        RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_) => {
            SendError::Transient(e.to_string())
        }
        other => SendError::Permanent(other.to_string()),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
