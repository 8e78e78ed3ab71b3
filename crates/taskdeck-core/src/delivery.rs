//! The outbound messaging seam between the scheduler and the chat transport.
//!
//! The dispatcher only knows this trait; the Telegram adapter implements it.
//! The transient/permanent split drives the retry policy: rate limits and
//! network hiccups are retried with backoff, API rejections are not.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    /// Network/rate-limit failure — worth retrying within the same tick.
    #[error("transient send failure: {0}")]
    Transient(String),

    /// The gateway rejected the message — retrying cannot help.
    #[error("permanent send failure: {0}")]
    Permanent(String),
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }
}

/// Narrow interface over the external messaging gateway.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `text` to `chat_id`.
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), SendError>;
}
