//! Storage trait definitions

use anyhow::Result;

/// Trait for the local persistent key-value store
///
/// A small set of string slots that survive restarts. Implementations must
/// be safe to share across threads.
pub trait LocalStore: Send + Sync {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Store several slots together
    ///
    /// Backends that support transactions should write all entries or none.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove the value stored under `key`
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every stored value
    fn clear(&self) -> Result<()>;
}
