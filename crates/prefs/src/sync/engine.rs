//! Sync engine for the configuration document
//!
//! Owns the in-memory document and keeps it consistent with the local cache
//! and the remote store. All mutation goes through [`SyncEngine::update`].
//!
//! The engine is a plain state machine: it never spawns threads or sleeps.
//! Debounced pushes, retries and periodic pulls are timers that the host
//! fires by calling [`SyncEngine::run_due`], typically after sleeping until
//! [`SyncEngine::next_deadline`].
//!
//! Ordering guarantee: a background pull never runs while a local change is
//! waiting to be pushed, so an unflushed edit cannot be replaced by an older
//! remote document. Pushes are blocking calls made under `&mut self`, and the
//! pending flag is only cleared once the store confirms a push, so a push in
//! flight is always also pending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::timing::to_chrono;
use super::{
    Clock, EngineState, PullOutcome, SaveOutcome, SyncSettings, SyncStatus, SystemClock, Timers,
    WriteMode,
};
use crate::models::{ConfigDocument, DocumentPatch, Entity, EntityId, unique_slug};
use crate::remote::RemoteStore;
use crate::resolver;
use crate::storage::LocalCache;

/// Timers owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EngineTimer {
    /// Debounced push of pending changes
    Push,
    /// Backoff retry after a failed push
    Retry,
    /// Periodic background pull
    Pull,
}

/// Synchronizes the configuration document between memory, the local cache
/// and the remote store
pub struct SyncEngine {
    cache: LocalCache,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,

    state: EngineState,
    doc: ConfigDocument,
    remote_enabled: bool,
    initial_sync_complete: bool,

    /// Local changes not yet confirmed by the remote store
    pending: bool,
    failed_attempts: u32,
    /// Retry budget spent on transient failures; the next pull cycle pushes
    stalled: bool,
    status: SyncStatus,
    last_synced_at: Option<DateTime<Utc>>,

    timers: Timers<EngineTimer>,
}

impl SyncEngine {
    /// Create an engine over a local cache and a remote store
    pub fn new(cache: LocalCache, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache,
            remote,
            clock: Arc::new(SystemClock),
            settings: SyncSettings::default(),
            state: EngineState::Uninitialized,
            doc: ConfigDocument::default(),
            remote_enabled: false,
            initial_sync_complete: false,
            pending: false,
            failed_attempts: 0,
            stalled: false,
            status: SyncStatus::LocalOnly,
            last_synced_at: None,
            timers: Timers::new(),
        }
    }

    /// Use a custom time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use custom timing
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Populate in-memory state from the local cache
    ///
    /// `Uninitialized -> Loading`. No-op in any other state.
    pub fn mount(&mut self) {
        if self.state != EngineState::Uninitialized {
            return;
        }

        self.doc = self.cache.read();
        self.doc.normalize();
        self.last_synced_at = self.cache.last_sync();
        self.state = EngineState::Loading;

        info!(
            "Configuration loaded from local cache ({} inboxes)",
            self.doc.entities.len()
        );
    }

    /// Probe the remote store and perform the initial pull
    ///
    /// `Loading -> Ready`. A pulled document replaces in-memory state unless
    /// a local change is already pending. Remote failures leave the engine
    /// in local-only mode.
    pub fn complete_initial_sync(&mut self) -> PullOutcome {
        self.mount();
        if self.state == EngineState::Ready {
            return PullOutcome::Unchanged;
        }

        let outcome = match self.remote.probe() {
            Ok(true) => {
                self.remote_enabled = true;
                if self.pending {
                    debug!("Skipping initial pull: local changes pending");
                    PullOutcome::Skipped
                } else {
                    self.pull_into_state()
                }
            }
            Ok(false) => {
                info!("Remote storage disabled; using local cache only");
                self.remote_enabled = false;
                PullOutcome::Disabled
            }
            Err(e) => {
                warn!("Remote store unavailable, continuing locally: {}", e);
                self.remote_enabled = false;
                PullOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.state = EngineState::Ready;
        self.initial_sync_complete = true;

        if self.remote_enabled {
            self.schedule_pull();
            if self.pending {
                // Changes made while loading go out on the next run_due
                self.status = SyncStatus::Pending;
                let now = self.clock.now();
                self.timers.schedule(EngineTimer::Push, now, ());
            } else if let PullOutcome::Failed { reason } = &outcome {
                self.status = SyncStatus::Failed {
                    attempts: 1,
                    reason: reason.clone(),
                };
            } else {
                self.status = SyncStatus::Synced;
            }
        } else {
            // Changes made while loading are already in the local cache
            self.pending = false;
            self.timers.cancel(&EngineTimer::Push);
            self.status = SyncStatus::LocalOnly;
        }

        info!("Sync engine ready (remote {})", if self.remote_enabled { "enabled" } else { "disabled" });
        outcome
    }

    /// Mount and complete the initial sync in one step
    pub fn start(&mut self) -> PullOutcome {
        self.mount();
        self.complete_initial_sync()
    }

    // ========================================================================
    // Read / update
    // ========================================================================

    /// Current in-memory document
    pub fn read(&self) -> &ConfigDocument {
        &self.doc
    }

    /// Merge `patch` into the document and persist it
    ///
    /// The merged document is written to the local cache before this
    /// returns. `Debounced` (re)starts the push timer so a burst of updates
    /// produces one push after the last of them; `Immediate` pushes now.
    /// Updates made before the engine is ready are kept and pushed once the
    /// initial sync completes.
    pub fn update(&mut self, patch: DocumentPatch, mode: WriteMode) -> SaveOutcome {
        if self.state == EngineState::Uninitialized {
            self.mount();
        }

        patch.apply(&mut self.doc);
        let dropped = self.doc.dedupe_ids();
        if dropped > 0 {
            warn!("Dropped {} inbox(es) with a duplicate id", dropped);
        }
        self.doc.normalize();
        self.cache.write(&self.doc);

        if self.state == EngineState::Ready && !self.remote_enabled {
            return SaveOutcome::LocalOnly;
        }

        self.pending = true;
        self.failed_attempts = 0;
        self.stalled = false;
        self.status = SyncStatus::Pending;
        self.timers.cancel(&EngineTimer::Retry);

        match mode {
            WriteMode::Immediate if self.state == EngineState::Ready => self.push_now(),
            WriteMode::Immediate => {
                let now = self.clock.now();
                self.timers.schedule(EngineTimer::Push, now, ());
                SaveOutcome::Scheduled
            }
            WriteMode::Debounced => {
                let deadline = self.clock.now() + to_chrono(self.settings.push_debounce);
                self.timers.schedule(EngineTimer::Push, deadline, ());
                SaveOutcome::Scheduled
            }
        }
    }

    /// Push pending changes right away
    ///
    /// Also serves as the explicit retry after failures: the retry budget
    /// starts over.
    pub fn flush(&mut self) -> SaveOutcome {
        if self.state != EngineState::Ready {
            return if self.pending {
                SaveOutcome::Scheduled
            } else {
                SaveOutcome::LocalOnly
            };
        }
        if !self.remote_enabled {
            return SaveOutcome::LocalOnly;
        }
        if !self.pending {
            return SaveOutcome::Saved;
        }

        self.failed_attempts = 0;
        self.push_now()
    }

    /// Pull the remote document unless local changes are waiting
    pub fn periodic_pull(&mut self) -> PullOutcome {
        if self.state != EngineState::Ready || !self.remote_enabled {
            return PullOutcome::Disabled;
        }
        if self.pending {
            debug!("Skipping pull: local changes pending");
            return PullOutcome::Skipped;
        }
        self.pull_into_state()
    }

    /// Clear the local cache and the remote store, returning to the zero
    /// document
    pub fn reset(&mut self) -> SaveOutcome {
        self.timers.cancel(&EngineTimer::Push);
        self.timers.cancel(&EngineTimer::Retry);
        self.cache.clear();
        self.doc = ConfigDocument::default();
        self.pending = false;
        self.failed_attempts = 0;
        self.stalled = false;
        self.last_synced_at = None;

        if !self.remote_enabled {
            self.status = SyncStatus::LocalOnly;
            info!("Configuration reset (local only)");
            return SaveOutcome::LocalOnly;
        }

        match self.remote.delete() {
            Ok(()) => {
                self.status = SyncStatus::Synced;
                info!("Configuration reset");
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!("Failed to delete remote configuration: {}", e);
                let reason = e.to_string();
                self.status = SyncStatus::Failed {
                    attempts: 1,
                    reason: reason.clone(),
                };
                SaveOutcome::Failed {
                    reason,
                    will_retry: false,
                }
            }
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Fire every engine timer that is due, returning how many fired
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let due = self.timers.take_due(now);
        let fired = due.len();
        let mut pushed = false;

        for (timer, ()) in due {
            match timer {
                EngineTimer::Push | EngineTimer::Retry => {
                    if self.state != EngineState::Ready {
                        let deadline = now + to_chrono(self.settings.push_debounce);
                        self.timers.schedule(EngineTimer::Push, deadline, ());
                        debug!("Deferring push until initial sync completes");
                        continue;
                    }
                    if !pushed && self.pending && self.remote_enabled {
                        self.push_now();
                        pushed = true;
                    }
                }
                EngineTimer::Pull => {
                    if self.stalled && !pushed && self.remote_enabled {
                        // Start a fresh retry round instead of pulling
                        self.failed_attempts = 0;
                        self.push_now();
                        pushed = true;
                    } else {
                        self.periodic_pull();
                    }
                    self.schedule_pull();
                }
            }
        }

        fired
    }

    /// Earliest time at which [`run_due`](Self::run_due) has work to do
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    /// Whether local changes are waiting for the remote store
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.remote_enabled
    }

    pub fn initial_sync_complete(&self) -> bool {
        self.initial_sync_complete
    }

    /// When the document was last confirmed against the remote store
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // Entity and setting helpers
    // ========================================================================

    /// Add an inbox, or replace the one with the same id
    ///
    /// The slug is regenerated when empty or already taken.
    pub fn add_entity(&mut self, mut entity: Entity) -> SaveOutcome {
        let mut entities = self.doc.entities.clone();
        let taken = entity.slug.is_empty()
            || entities
                .iter()
                .any(|e| e.id != entity.id && e.slug == entity.slug);
        if taken {
            entity.slug = unique_slug(&entity.display_name, &entities, Some(&entity.id));
        }

        match entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }

        self.update(DocumentPatch::new().with_entities(entities), WriteMode::Debounced)
    }

    /// Rename an inbox, regenerating its slug
    ///
    /// Returns `None` if no inbox has that id.
    pub fn rename_entity(&mut self, id: &EntityId, display_name: &str) -> Option<SaveOutcome> {
        let mut entities = self.doc.entities.clone();
        let index = entities.iter().position(|e| &e.id == id)?;
        let others = entities.clone();
        entities[index].rename(display_name, &others);

        Some(self.update(DocumentPatch::new().with_entities(entities), WriteMode::Debounced))
    }

    /// Remove an inbox with its overrides and its place in the custom order
    ///
    /// Returns `None` if no inbox has that id.
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<SaveOutcome> {
        self.doc.entity(id)?;

        let entities = self
            .doc
            .entities
            .iter()
            .filter(|e| &e.id != id)
            .cloned()
            .collect();

        let mut overrides = self.doc.entity_overrides.clone();
        overrides.remove(id);

        let mut patch = DocumentPatch::new()
            .with_entities(entities)
            .with_entity_overrides(overrides);

        if self
            .doc
            .preferences
            .inbox_order
            .as_ref()
            .is_some_and(|order| order.contains(id))
        {
            let mut preferences = self.doc.preferences.clone();
            if let Some(order) = preferences.inbox_order.as_mut() {
                order.retain(|other| other != id);
            }
            patch = patch.with_preferences(preferences);
        }

        Some(self.update(patch, WriteMode::Debounced))
    }

    /// Make `id` the selected inbox
    ///
    /// Returns `None` if no inbox has that id.
    pub fn select_entity(&mut self, id: &EntityId) -> Option<SaveOutcome> {
        self.doc.entity(id)?;

        let entities = self
            .doc
            .entities
            .iter()
            .cloned()
            .map(|e| {
                let selected = &e.id == id;
                e.with_selected(selected)
            })
            .collect();

        Some(self.update(DocumentPatch::new().with_entities(entities), WriteMode::Debounced))
    }

    /// Replace the credential, or clear it with `None`
    pub fn set_credential(&mut self, credential: Option<String>) -> SaveOutcome {
        self.update(DocumentPatch::new().with_credential(credential), WriteMode::Debounced)
    }

    /// Override a setting for one inbox
    pub fn set_override(
        &mut self,
        id: &EntityId,
        key: &str,
        value: impl Into<Value>,
    ) -> SaveOutcome {
        let next = resolver::set_override(&self.doc, id, key, value);
        self.update(
            DocumentPatch::new().with_entity_overrides(next.entity_overrides),
            WriteMode::Debounced,
        )
    }

    /// Remove a per-inbox override
    pub fn clear_override(&mut self, id: &EntityId, key: &str) -> SaveOutcome {
        let next = resolver::clear_override(&self.doc, id, key);
        self.update(
            DocumentPatch::new().with_entity_overrides(next.entity_overrides),
            WriteMode::Debounced,
        )
    }

    /// Resolve a per-inbox setting against the current document
    pub fn resolve<T: DeserializeOwned>(&self, id: &EntityId, key: &str, default: T) -> T {
        resolver::resolve(&self.doc, id, key, default)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn push_now(&mut self) -> SaveOutcome {
        self.timers.cancel(&EngineTimer::Push);
        self.timers.cancel(&EngineTimer::Retry);

        self.stalled = false;
        match self.remote.push(&self.doc) {
            Ok(saved) => {
                // Only the store-assigned metadata is taken from the response
                self.doc.version = saved.version;
                self.doc.last_updated = saved.last_updated;
                self.cache.write(&self.doc);

                self.pending = false;
                self.failed_attempts = 0;
                self.mark_synced();
                info!("Configuration saved (version {})", self.doc.version);
                SaveOutcome::Saved
            }
            Err(e) => {
                self.failed_attempts += 1;
                let reason = e.to_string();
                let will_retry =
                    e.is_retryable() && self.settings.retry.should_retry(self.failed_attempts);

                if will_retry {
                    let delay = self.settings.retry.delay_for(self.failed_attempts);
                    let deadline = self.clock.now() + to_chrono(delay);
                    self.timers.schedule(EngineTimer::Retry, deadline, ());
                    warn!(
                        "Push failed (attempt {}), retrying in {:?}: {}",
                        self.failed_attempts, delay, e
                    );
                } else if e.is_retryable() {
                    self.stalled = true;
                    warn!(
                        "Push failed (attempt {}), retrying on the next pull cycle: {}",
                        self.failed_attempts, e
                    );
                } else {
                    warn!(
                        "Push failed (attempt {}), giving up until the next change: {}",
                        self.failed_attempts, e
                    );
                }

                self.status = SyncStatus::Failed {
                    attempts: self.failed_attempts,
                    reason: reason.clone(),
                };
                SaveOutcome::Failed { reason, will_retry }
            }
        }
    }

    fn pull_into_state(&mut self) -> PullOutcome {
        match self.remote.pull() {
            Ok(Some(mut remote_doc)) => {
                remote_doc.normalize();
                self.mark_synced();
                if remote_doc == self.doc {
                    return PullOutcome::Unchanged;
                }

                self.doc = remote_doc;
                self.cache.write(&self.doc);
                info!("Applied remote configuration (version {})", self.doc.version);
                PullOutcome::Applied
            }
            Ok(None) => {
                self.mark_synced();
                PullOutcome::Unchanged
            }
            Err(e) => {
                warn!("Pull failed: {}", e);
                PullOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn mark_synced(&mut self) {
        let now = self.clock.now();
        self.last_synced_at = Some(now);
        self.cache.record_last_sync(now);
        if !self.pending {
            self.status = SyncStatus::Synced;
        }
    }

    fn schedule_pull(&mut self) {
        let deadline = self.clock.now() + to_chrono(self.settings.pull_interval);
        self.timers.schedule(EngineTimer::Pull, deadline, ());
    }
}
