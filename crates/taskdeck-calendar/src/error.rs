use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Access token rejected and the refresh exchange failed too — the user
    /// needs to reconnect their calendar.
    #[error("Google authorization expired")]
    AuthExpired,

    #[error("Unexpected response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
