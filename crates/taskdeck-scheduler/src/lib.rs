//! Background delivery engine: reminder and daily-summary scheduling.
//!
//! The engine runs on at most one process per deployment. Which process
//! that is gets decided once at startup by [`leader::resolve_role`];
//! within the winning process a periodic tick scans half-open time
//! windows and claims each delivery through the store before sending,
//! so a misconfigured second leader still cannot double-deliver.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod leader;

pub use dispatch::{DispatchPolicy, Dispatcher};
pub use engine::{EngineConfig, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use leader::{resolve_role, Role};
