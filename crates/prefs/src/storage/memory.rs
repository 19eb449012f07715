//! In-memory local store implementation
//!
//! Used for testing and for hosts that have no durable local storage.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::LocalStore;

/// In-memory implementation of LocalStore
///
/// Uses a HashMap protected by an RwLock for thread-safe access.
#[derive(Default)]
pub struct InMemoryLocalStore {
    slots: RwLock<HashMap<String, String>>,
}

impl InMemoryLocalStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored slots
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for InMemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        // Single lock so readers never observe a half-applied write
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            slots.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
        Ok(())
    }
}
