pub mod adapter;
pub mod commands;
pub mod context;
pub mod error;
pub mod handler;
pub mod messenger;
pub mod send;

pub use adapter::TelegramAdapter;
pub use context::{ChatDefaults, TelegramContext};
pub use error::TelegramError;
pub use messenger::TelegramMessenger;
