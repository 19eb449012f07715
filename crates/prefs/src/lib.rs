//! Prefs crate - Synchronized configuration for Inboxkit clients
//!
//! This crate keeps one configuration document (inboxes, credential,
//! preferences, per-inbox overrides, reply drafts) consistent across:
//! - an in-memory copy that reads never block on
//! - a local key-value cache that survives restarts
//! - an optional remote store shared between clients
//!
//! The [`SyncEngine`] is the only writer. It persists every change locally
//! right away, debounces pushes to the remote store, and pulls remote
//! changes in the background without ever replacing unpushed local edits.
//!
//! This crate has zero UI dependencies and no async runtime: hosts drive
//! timers explicitly through [`Session::tick`].

pub mod deployment;
pub mod drafts;
pub mod models;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod sync;

pub use deployment::DeploymentDefaults;
pub use drafts::DraftManager;
pub use models::{
    ConfigDocument, ConversationId, DocumentPatch, Draft, Entity, EntityId, NotificationPrefs,
    Preferences, SettingMap, slugify, unique_slug,
};
pub use remote::{
    FileConfigStore, HttpRemoteStore, InMemoryRemoteStore, RemoteError, RemoteStore, StoreError,
    ValidationError,
};
pub use session::{Session, TickReport};
pub use storage::{InMemoryLocalStore, LocalCache, LocalSlot, LocalStore, SqliteLocalStore};
pub use sync::{
    Clock, EngineState, ManualClock, PullOutcome, RetryPolicy, SaveOutcome, SyncEngine,
    SyncSettings, SyncStatus, SystemClock, WriteMode,
};
