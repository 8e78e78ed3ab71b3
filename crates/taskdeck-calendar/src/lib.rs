//! `taskdeck-calendar` — narrow Google Calendar collaborator.
//!
//! One operation: insert an event into the user's primary calendar using
//! their stored OAuth tokens, refreshing the access token once on a 401.
//! The consent flow that produces the stored tokens is outside this crate.

pub mod client;
pub mod error;

pub use client::{CalendarClient, CreatedEvent};
pub use error::{CalendarError, Result};
