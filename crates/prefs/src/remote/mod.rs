//! Remote persistence of the configuration document
//!
//! [`RemoteStore`] is the seam between the sync engine and wherever the
//! document is durably kept: an HTTP endpoint, a file on the server itself,
//! or memory in tests.

mod file;
mod http;
mod memory;
mod traits;
pub mod wire;

pub use file::{FileConfigStore, StoreError, next_version};
pub use http::HttpRemoteStore;
pub use memory::InMemoryRemoteStore;
pub use traits::{RemoteError, RemoteStore};
pub use wire::{DeleteResponse, LoadResponse, SaveResponse, ValidationError, validate_payload};
