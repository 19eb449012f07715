//! Synchronization of the configuration document
//!
//! - [`SyncEngine`]: lifecycle, read/update, debounced push, periodic pull
//! - [`Timers`] and [`Clock`]: deterministic timing primitives
//! - [`SyncSettings`]: debounce windows, intervals and retry policy

mod clock;
mod engine;
mod status;
mod timers;
mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::SyncEngine;
pub use status::{EngineState, PullOutcome, SaveOutcome, SyncStatus, WriteMode};
pub use timers::Timers;
pub(crate) use timing::to_chrono;
pub use timing::{
    DEFAULT_DRAFT_DEBOUNCE, DEFAULT_PULL_INTERVAL, DEFAULT_PUSH_DEBOUNCE, DEFAULT_REQUEST_TIMEOUT,
    RetryPolicy, SyncSettings,
};
