use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A task the oracle pulled out of free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTask {
    /// Short title, at most ~100 chars by contract.
    pub title: String,
    /// Absolute due instant (the oracle converts from the user's timezone).
    pub due_utc: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unparseable oracle reply: {0}")]
    Parse(String),

    #[error("Extractor unavailable: {0}")]
    Unavailable(String),
}

/// Narrow interface over the external text→task oracle.
///
/// `Ok(None)` means "the model says this is not a task" — the caller falls
/// back to its help reply. Errors degrade the same way, they never reach the
/// user as errors.
#[async_trait]
pub trait TaskExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(
        &self,
        text: &str,
        tz_name: &str,
        now_utc: DateTime<Utc>,
    ) -> Result<Option<ExtractedTask>, ExtractError>;
}
