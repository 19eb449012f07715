//! Session facade composing the sync engine and the draft manager
//!
//! One `Session` per application run. The host drives it with [`Session::tick`]
//! and can sleep until [`Session::next_deadline`] in between.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;

use crate::drafts::DraftManager;
use crate::models::ConfigDocument;
use crate::remote::RemoteStore;
use crate::storage::LocalCache;
use crate::sync::{Clock, PullOutcome, SaveOutcome, SyncEngine, SyncSettings, SyncStatus};

/// Work done by one [`Session::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub drafts_committed: usize,
    pub timers_fired: usize,
}

/// The configuration engine and draft manager for one application run
pub struct Session {
    engine: SyncEngine,
    drafts: DraftManager,
}

impl Session {
    pub fn new(
        cache: LocalCache,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        let engine = SyncEngine::new(cache, remote)
            .with_clock(clock)
            .with_settings(settings);
        let drafts = DraftManager::for_engine(&engine);
        Self { engine, drafts }
    }

    /// Load local state and complete the initial sync
    pub fn start(&mut self) -> PullOutcome {
        self.engine.start()
    }

    /// Fire everything that is due
    ///
    /// Drafts go first so a committed draft joins the engine's debounced
    /// push in the same pass.
    pub fn tick(&mut self) -> TickReport {
        let drafts_committed = self.drafts.run_due(&mut self.engine);
        let timers_fired = self.engine.run_due();
        TickReport {
            drafts_committed,
            timers_fired,
        }
    }

    /// Earliest deadline across engine and draft timers
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.engine.next_deadline(), self.drafts.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn document(&self) -> &ConfigDocument {
        self.engine.read()
    }

    pub fn status(&self) -> &SyncStatus {
        self.engine.status()
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine {
        &mut self.engine
    }

    /// The draft manager together with the engine it writes to
    pub fn drafts_mut(&mut self) -> (&mut DraftManager, &mut SyncEngine) {
        (&mut self.drafts, &mut self.engine)
    }

    pub fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    /// Stop the session
    ///
    /// Unsaved draft edits are dropped; pending document changes are pushed.
    pub fn shutdown(mut self) -> SaveOutcome {
        let dropped = self.drafts.teardown();
        let outcome = self.engine.flush();
        info!(
            "Session closed ({} unsaved draft edit(s) dropped, {:?})",
            dropped, outcome
        );
        outcome
    }
}
