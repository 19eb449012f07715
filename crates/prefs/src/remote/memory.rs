//! In-memory remote store for testing

use std::sync::{PoisonError, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;

use super::file::next_version;
use super::{RemoteError, RemoteStore};
use crate::models::ConfigDocument;

/// In-memory remote store
///
/// Useful for testing and development. Supports failure injection and
/// counts the requests it receives.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    enabled: AtomicBool,
    document: RwLock<Option<ConfigDocument>>,
    failure: RwLock<Option<(RemoteError, bool)>>,
    pushes: AtomicUsize,
    pulls: AtomicUsize,
}

impl InMemoryRemoteStore {
    /// Create an enabled, empty store
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Create a store with remote storage switched off
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create an enabled store holding `doc`
    pub fn with_document(doc: ConfigDocument) -> Self {
        let store = Self::new();
        *store.document.write().unwrap_or_else(PoisonError::into_inner) = Some(doc);
        store
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Fail the next request with `err`
    pub fn fail_next(&self, err: RemoteError) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = Some((err, false));
    }

    /// Fail every request with `err` until cleared with `None`
    pub fn set_failure(&self, err: Option<RemoteError>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = err.map(|e| (e, true));
    }

    /// The stored document
    pub fn document(&self) -> Option<ConfigDocument> {
        self.document.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of push requests received, failed ones included
    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    /// Number of pull requests received, failed ones included
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    fn injected_failure(&self) -> Option<RemoteError> {
        let mut failure = self.failure.write().unwrap_or_else(PoisonError::into_inner);
        let persistent = failure.as_ref()?.1;
        if persistent {
            failure.as_ref().map(|(err, _)| err.clone())
        } else {
            failure.take().map(|(err, _)| err)
        }
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn probe(&self) -> Result<bool, RemoteError> {
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn pull(&self) -> Result<Option<ConfigDocument>, RemoteError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.document())
    }

    fn push(&self, doc: &ConfigDocument) -> Result<ConfigDocument, RemoteError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(RemoteError::Disabled);
        }

        let mut stored = self.document.write().unwrap_or_else(PoisonError::into_inner);
        let previous = stored.as_ref().map(|d| d.version.clone()).unwrap_or_default();

        let mut saved = doc.clone();
        saved.version = next_version(&previous);
        saved.last_updated = Some(Utc::now());
        *stored = Some(saved.clone());
        Ok(saved)
    }

    fn delete(&self) -> Result<(), RemoteError> {
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }
        *self.document.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
