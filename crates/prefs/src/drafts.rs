//! Reply drafts with debounced saving
//!
//! Each conversation has at most one pending save timer. Saving again within
//! the debounce window replaces the timer and its content, so a burst of
//! keystrokes becomes one document update after the last of them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;

use crate::models::{ConversationId, Draft, DocumentPatch};
use crate::sync::{Clock, DEFAULT_DRAFT_DEBOUNCE, SaveOutcome, SyncEngine, Timers, WriteMode, to_chrono};

/// Debounces draft edits into sync engine updates
pub struct DraftManager {
    clock: Arc<dyn Clock>,
    debounce: Duration,
    timers: Timers<ConversationId, String>,
}

impl DraftManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            debounce: DEFAULT_DRAFT_DEBOUNCE,
            timers: Timers::new(),
        }
    }

    /// Create a manager sharing the engine's clock and draft debounce
    pub fn for_engine(engine: &SyncEngine) -> Self {
        Self::new(engine.clock().clone()).with_debounce(engine.settings().draft_debounce)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Record new content for a conversation, restarting its save timer
    pub fn save(&mut self, id: impl Into<ConversationId>, content: impl Into<String>) {
        let deadline = self.clock.now() + to_chrono(self.debounce);
        self.timers.schedule(id.into(), deadline, content.into());
    }

    /// Commit every draft whose timer is due, returning how many were saved
    pub fn run_due(&mut self, engine: &mut SyncEngine) -> usize {
        let now = self.clock.now();
        let due = self.timers.take_due(now);
        if due.is_empty() {
            return 0;
        }

        let mut drafts = engine.read().drafts.clone();
        let count = due.len();
        for (id, content) in due {
            drafts.insert(id, Draft::new(content, now));
        }

        debug!("Committing {} draft(s)", count);
        engine.update(DocumentPatch::new().with_drafts(drafts), WriteMode::Debounced);
        count
    }

    /// Committed draft content for a conversation
    pub fn load<'a>(&self, engine: &'a SyncEngine, id: &ConversationId) -> Option<&'a str> {
        engine.read().drafts.get(id).map(|d| d.content.as_str())
    }

    /// Whether a committed draft with visible content exists
    ///
    /// An empty or whitespace-only draft reports `false` even though its
    /// record is kept. Content still waiting on its timer is not counted.
    pub fn has_draft(&self, engine: &SyncEngine, id: &ConversationId) -> bool {
        engine.read().drafts.get(id).is_some_and(Draft::has_content)
    }

    /// When the committed draft was last saved
    pub fn last_saved_at(&self, engine: &SyncEngine, id: &ConversationId) -> Option<DateTime<Utc>> {
        engine.read().drafts.get(id).map(|d| d.last_saved_at)
    }

    /// Drop the draft for a conversation
    ///
    /// Cancels its pending timer and removes the key from the document.
    /// Returns `None` when there was no committed draft to remove.
    pub fn discard(&mut self, engine: &mut SyncEngine, id: &ConversationId) -> Option<SaveOutcome> {
        self.timers.cancel(id);

        if !engine.read().drafts.contains_key(id) {
            return None;
        }
        let mut drafts = engine.read().drafts.clone();
        drafts.remove(id);
        Some(engine.update(DocumentPatch::new().with_drafts(drafts), WriteMode::Debounced))
    }

    /// Whether a save is waiting on its timer for a conversation
    pub fn has_pending(&self, id: &ConversationId) -> bool {
        self.timers.is_scheduled(id)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// Cancel every pending save, returning how many were dropped
    pub fn teardown(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!("Dropped {} pending draft save(s)", cancelled);
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteStore;
    use crate::storage::{InMemoryLocalStore, LocalCache};
    use crate::sync::ManualClock;

    fn setup() -> (SyncEngine, DraftManager, ManualClock) {
        let clock = ManualClock::default();
        let mut engine = SyncEngine::new(
            LocalCache::new(Arc::new(InMemoryLocalStore::new())),
            Arc::new(InMemoryRemoteStore::disabled()),
        )
        .with_clock(Arc::new(clock.clone()));
        engine.start();
        let drafts = DraftManager::for_engine(&engine);
        (engine, drafts, clock)
    }

    #[test]
    fn test_keystrokes_collapse_into_one_write() {
        let (mut engine, mut drafts, clock) = setup();
        let id = ConversationId::new("c1");

        drafts.save("c1", "H");
        clock.advance_ms(1000);
        drafts.save("c1", "He");
        clock.advance_ms(1000);
        drafts.save("c1", "Hello");

        clock.advance_ms(4999);
        assert_eq!(drafts.run_due(&mut engine), 0);
        assert!(drafts.load(&engine, &id).is_none());
        assert!(drafts.has_pending(&id));

        clock.advance_ms(1);
        assert_eq!(drafts.run_due(&mut engine), 1);
        assert_eq!(drafts.load(&engine, &id), Some("Hello"));
        assert_eq!(drafts.last_saved_at(&engine, &id), Some(clock.now()));
        assert!(!drafts.has_pending(&id));
    }

    #[test]
    fn test_empty_draft_is_not_a_draft() {
        let (mut engine, mut drafts, clock) = setup();
        let id = ConversationId::new("c1");

        drafts.save("c1", "   ");
        clock.advance_ms(5000);
        drafts.run_due(&mut engine);

        assert_eq!(drafts.load(&engine, &id), Some("   "));
        assert!(!drafts.has_draft(&engine, &id));

        assert!(drafts.discard(&mut engine, &id).is_some());
        assert!(drafts.load(&engine, &id).is_none());
        assert!(!engine.read().drafts.contains_key(&id));
    }

    #[test]
    fn test_discard_cancels_pending_save() {
        let (mut engine, mut drafts, clock) = setup();
        let id = ConversationId::new("c1");

        drafts.save("c1", "never saved");
        assert!(drafts.discard(&mut engine, &id).is_none());

        clock.advance_ms(10_000);
        assert_eq!(drafts.run_due(&mut engine), 0);
        assert!(drafts.load(&engine, &id).is_none());
    }

    #[test]
    fn test_teardown_cancels_everything() {
        let (mut engine, mut drafts, clock) = setup();
        drafts.save("c1", "a");
        drafts.save("c2", "b");

        assert_eq!(drafts.teardown(), 2);
        assert!(drafts.next_deadline().is_none());

        clock.advance_ms(10_000);
        assert_eq!(drafts.run_due(&mut engine), 0);
        assert!(engine.read().drafts.is_empty());
    }

    #[test]
    fn test_conversations_are_independent() {
        let (mut engine, mut drafts, clock) = setup();
        drafts.save("c1", "first");
        clock.advance_ms(3000);
        drafts.save("c2", "second");

        clock.advance_ms(2000);
        assert_eq!(drafts.run_due(&mut engine), 1);
        assert!(drafts.has_draft(&engine, &ConversationId::new("c1")));
        assert!(drafts.has_pending(&ConversationId::new("c2")));
    }
}
