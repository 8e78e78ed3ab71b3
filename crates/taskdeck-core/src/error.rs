use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskdeckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone: {0}")]
    Timezone(String),
}

pub type Result<T> = std::result::Result<T, TaskdeckError>;
