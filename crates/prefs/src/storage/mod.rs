//! Local storage traits and implementations
//!
//! This module defines the local key-value abstraction the configuration
//! document is cached in. The trait-based design allows swapping between
//! in-memory and SQLite-backed storage.

mod cache;
mod memory;
mod sqlite;
mod traits;

pub use cache::{LocalCache, LocalSlot};
pub use memory::InMemoryLocalStore;
pub use sqlite::SqliteLocalStore;
pub use traits::LocalStore;
