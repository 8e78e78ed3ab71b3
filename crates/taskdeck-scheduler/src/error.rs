use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] taskdeck_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
