//! `taskdeck-ai` — the text→structured-task extraction oracle.
//!
//! When the deterministic `HH:MM DD.MM text` parser doesn't match, the raw
//! message goes to this collaborator. The [`extract::TaskExtractor`] trait is
//! the seam; [`openai::OpenAiExtractor`] talks to any OpenAI-compatible chat
//! completions endpoint and expects a strict JSON reply.

pub mod extract;
pub mod openai;

pub use extract::{ExtractError, ExtractedTask, TaskExtractor};
pub use openai::OpenAiExtractor;
