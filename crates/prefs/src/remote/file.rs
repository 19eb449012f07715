//! File-backed configuration store used by the persistence endpoint
//!
//! The document lives in a single JSON file. Every write goes through
//! [`config::save_json_file`], which prepares the full content in a
//! temporary file and renames it over the previous version.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use log::{debug, info, warn};
use serde_json::Value;

use super::wire::{ValidationError, parse_payload};
use super::{RemoteError, RemoteStore};
use crate::deployment::DeploymentDefaults;
use crate::models::ConfigDocument;
use crate::sync::{Clock, SystemClock};

/// Extension of the marker written beside the document once the deployment
/// defaults have been used, so a deleted document is not seeded again
const SEED_MARKER_EXT: &str = "seeded";

/// Version prefix stamped on saved documents
const VERSION_PREFIX: &str = "1.0.";

/// Failures of the file-backed store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("remote storage is disabled")]
    Disabled,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<StoreError> for RemoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Disabled => RemoteError::Disabled,
            StoreError::Invalid(e) => RemoteError::Rejected {
                status: 400,
                message: e.to_string(),
            },
            StoreError::Storage(e) => RemoteError::Storage(format!("{:#}", e)),
        }
    }
}

/// Configuration store persisted to a JSON file
pub struct FileConfigStore {
    path: PathBuf,
    defaults: DeploymentDefaults,
    clock: Arc<dyn Clock>,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileConfigStore {
    /// Create a store for the document at `path`
    pub fn new(path: impl Into<PathBuf>, defaults: DeploymentDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            clock: Arc::new(SystemClock),
            lock: Mutex::new(()),
        }
    }

    /// Create a store at the location named by the deployment defaults
    pub fn from_defaults(defaults: DeploymentDefaults) -> anyhow::Result<Self> {
        let path = defaults
            .document_path()
            .context("Could not determine storage directory")?;
        Ok(Self::new(path, defaults))
    }

    /// Use a custom time source for `lastUpdated` stamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Path of the persisted document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether remote storage is enabled for this deployment
    pub fn is_enabled(&self) -> bool {
        self.defaults.remote_storage
    }

    /// Load the persisted document
    ///
    /// Returns `None` when remote storage is disabled. When enabled and no
    /// document exists yet, the deployment defaults are persisted and
    /// returned, once per storage location.
    pub fn load(&self) -> Result<Option<ConfigDocument>, StoreError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.path.exists() {
            let doc: ConfigDocument = config::load_json_file(&self.path)?;
            return Ok(Some(doc));
        }

        let marker = self.seed_marker_path();
        if marker.exists() {
            debug!("No stored configuration and defaults already used");
            return Ok(None);
        }

        let mut doc = self.defaults.seed_document();
        self.stamp(&mut doc, "");
        config::save_json_file(&self.path, &doc)?;
        config::write_atomic(&marker, b"")?;

        info!(
            "Seeded configuration at {} with {} inbox(es)",
            self.path.display(),
            doc.entities.len()
        );
        Ok(Some(doc))
    }

    /// Validate and persist a raw JSON payload
    pub fn save_value(&self, payload: Value) -> Result<ConfigDocument, StoreError> {
        if !self.is_enabled() {
            return Err(StoreError::Disabled);
        }
        let doc = parse_payload(payload)?;
        self.save(doc)
    }

    /// Persist `doc`, stamping version and timestamp
    pub fn save(&self, mut doc: ConfigDocument) -> Result<ConfigDocument, StoreError> {
        if !self.is_enabled() {
            return Err(StoreError::Disabled);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.stored_version();
        doc.repair_slugs();
        self.stamp(&mut doc, &previous);
        config::save_json_file(&self.path, &doc)?;

        debug!("Saved configuration version {}", doc.version);
        Ok(doc)
    }

    /// Remove the persisted document
    ///
    /// Returns whether a document existed.
    pub fn delete(&self) -> Result<bool, StoreError> {
        if !self.is_enabled() {
            return Err(StoreError::Disabled);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = config::remove_file(&self.path)?;
        if removed {
            info!("Deleted configuration at {}", self.path.display());
        }
        Ok(removed)
    }

    fn seed_marker_path(&self) -> PathBuf {
        self.path.with_extension(SEED_MARKER_EXT)
    }

    /// Version of the document currently on disk, empty when none
    fn stored_version(&self) -> String {
        if !self.path.exists() {
            return String::new();
        }
        match config::load_json_file::<ConfigDocument>(&self.path) {
            Ok(doc) => doc.version,
            Err(e) => {
                warn!("Ignoring unreadable stored configuration: {:#}", e);
                String::new()
            }
        }
    }

    fn stamp(&self, doc: &mut ConfigDocument, previous: &str) {
        doc.version = next_version(previous);
        doc.last_updated = Some(self.clock.now());
    }
}

impl RemoteStore for FileConfigStore {
    fn probe(&self) -> Result<bool, RemoteError> {
        Ok(self.is_enabled())
    }

    fn pull(&self) -> Result<Option<ConfigDocument>, RemoteError> {
        Ok(self.load()?)
    }

    fn push(&self, doc: &ConfigDocument) -> Result<ConfigDocument, RemoteError> {
        // Same structural checks the HTTP endpoint applies
        let payload = serde_json::to_value(doc)
            .map_err(|e| RemoteError::Storage(e.to_string()))?;
        Ok(self.save_value(payload)?)
    }

    fn delete(&self) -> Result<(), RemoteError> {
        FileConfigStore::delete(self)?;
        Ok(())
    }
}

/// Next version tag after `previous` (`1.0.0`, `1.0.1`, ...)
pub fn next_version(previous: &str) -> String {
    let next = previous
        .strip_prefix(VERSION_PREFIX)
        .and_then(|n| n.parse::<u64>().ok())
        .map_or(0, |n| n + 1);
    format!("{}{}", VERSION_PREFIX, next)
}
