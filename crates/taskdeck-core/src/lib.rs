//! `taskdeck-core` — shared types, configuration and time handling.
//!
//! # Overview
//!
//! Everything the other Taskdeck crates agree on lives here: the flat
//! [`config::BotConfig`] (TOML file + bare env overrides), the [`types::Task`]
//! record, the deterministic `HH:MM DD.MM text` parser, timezone-aware clock
//! helpers, message formatting, and the [`delivery::Messenger`] seam that the
//! scheduler dispatches through without knowing about Telegram.

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod format;
pub mod parse;
pub mod types;

pub use config::BotConfig;
pub use delivery::{Messenger, SendError};
pub use error::{Result, TaskdeckError};
pub use types::{ChatSettings, ClaimOutcome, GoogleTokens, NewTask, Task};
