//! Integration tests for the prefs crate
//!
//! These tests drive the engine against real local and remote stores
//! (SQLite cache, file-backed remote) with a manual clock.

use std::sync::Arc;

use prefs::remote::FileConfigStore;
use prefs::resolver::{self, keys};
use prefs::{
    ConfigDocument, ConversationId, DeploymentDefaults, DocumentPatch, Entity, EntityId,
    InMemoryLocalStore, InMemoryRemoteStore, LocalCache, ManualClock, Preferences, PullOutcome,
    RemoteStore, SaveOutcome, Session, SqliteLocalStore, SyncEngine, SyncSettings, WriteMode,
};
use serde_json::json;
use tempfile::TempDir;

fn sqlite_cache(dir: &TempDir, name: &str) -> LocalCache {
    let store = SqliteLocalStore::new(dir.path().join(name)).unwrap();
    LocalCache::new(Arc::new(store))
}

fn memory_cache() -> LocalCache {
    LocalCache::new(Arc::new(InMemoryLocalStore::new()))
}

fn engine(cache: LocalCache, remote: Arc<dyn RemoteStore>, clock: &ManualClock) -> SyncEngine {
    SyncEngine::new(cache, remote).with_clock(Arc::new(clock.clone()))
}

fn with_theme(doc: &ConfigDocument, theme: &str) -> DocumentPatch {
    let mut preferences = doc.preferences.clone();
    preferences.theme = Some(theme.to_string());
    DocumentPatch::new().with_preferences(preferences)
}

#[test]
fn test_end_to_end_scenario() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::default();
    let remote_path = dir.path().join("remote").join("config.json");

    // 1. Empty local cache, remote disabled
    let disabled = Arc::new(FileConfigStore::new(&remote_path, DeploymentDefaults::default()));
    let mut first = engine(sqlite_cache(&dir, "client.db"), disabled, &clock);
    assert_eq!(first.start(), PullOutcome::Disabled);
    assert_eq!(
        serde_json::to_value(first.read()).unwrap(),
        json!({"entities": [], "preferences": {}, "drafts": {}})
    );
    drop(first);

    // 2. Remote enabled with a seeded "Demo" inbox
    let defaults = DeploymentDefaults::default()
        .with_remote_storage(true)
        .with_default_inbox("demo-inbox", "Demo", Some("demo@example.com".to_string()));
    let remote: Arc<FileConfigStore> = Arc::new(FileConfigStore::new(&remote_path, defaults));

    let mut second = engine(sqlite_cache(&dir, "client.db"), remote.clone(), &clock);
    assert_eq!(second.start(), PullOutcome::Applied);
    let doc = second.read();
    assert_eq!(doc.entities.len(), 1);
    assert_eq!(doc.entities[0].display_name, "Demo");
    assert_eq!(doc.entities[0].slug, "demo");
    assert!(doc.entities[0].selected);

    // 3. Immediate theme change is visible to a fresh engine
    let patch = with_theme(second.read(), "dark");
    assert_eq!(second.update(patch, WriteMode::Immediate), SaveOutcome::Saved);

    let mut fresh = engine(memory_cache(), remote.clone(), &clock);
    fresh.start();
    assert_eq!(fresh.read().preferences.theme.as_deref(), Some("dark"));
    assert_eq!(fresh.read().entities[0].display_name, "Demo");
}

#[test]
fn test_local_cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::default();

    let mut engine_a = engine(
        sqlite_cache(&dir, "client.db"),
        Arc::new(InMemoryRemoteStore::disabled()),
        &clock,
    );
    engine_a.start();
    engine_a.add_entity(Entity::new("Support", &[]).with_param("address", "help@example.com"));
    engine_a.set_credential(Some("key-123".to_string()));
    drop(engine_a);

    let mut engine_b = engine(
        sqlite_cache(&dir, "client.db"),
        Arc::new(InMemoryRemoteStore::disabled()),
        &clock,
    );
    engine_b.mount();
    let doc = engine_b.read();
    assert_eq!(doc.entities[0].display_name, "Support");
    assert_eq!(doc.entities[0].params["address"], "help@example.com");
    assert_eq!(doc.credential.as_deref(), Some("key-123"));
}

#[test]
fn test_debounced_burst_pushes_last_state_once() {
    let clock = ManualClock::default();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let mut engine = engine(memory_cache(), remote.clone(), &clock);
    engine.start();

    for i in 1..=5 {
        let patch = with_theme(engine.read(), &format!("theme-{}", i));
        engine.update(patch, WriteMode::Debounced);
        clock.advance_ms(100);
        engine.run_due();
    }
    assert_eq!(remote.push_count(), 0);

    clock.advance_ms(1000);
    engine.run_due();

    assert_eq!(remote.push_count(), 1);
    let stored = remote.document().unwrap();
    assert_eq!(stored.preferences.theme.as_deref(), Some("theme-5"));
}

#[test]
fn test_background_pull_never_clobbers_pending_edit() {
    let clock = ManualClock::default();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let settings = SyncSettings::default()
        .with_push_debounce(std::time::Duration::from_secs(60))
        .with_pull_interval(std::time::Duration::from_secs(30));
    let mut engine = engine(memory_cache(), remote.clone(), &clock).with_settings(settings);
    engine.start();

    // Another client writes while we have an unpushed edit
    let patch = with_theme(engine.read(), "mine");
    engine.update(patch, WriteMode::Debounced);
    let mut theirs = ConfigDocument::default();
    theirs.preferences = Preferences::default().with_theme("theirs");
    remote.push(&theirs).unwrap();
    let pulls = remote.pull_count();

    clock.advance_ms(30_000);
    engine.run_due();
    assert_eq!(remote.pull_count(), pulls);
    assert_eq!(engine.read().preferences.theme.as_deref(), Some("mine"));

    clock.advance_ms(30_000);
    engine.run_due();
    assert_eq!(remote.document().unwrap().preferences.theme.as_deref(), Some("mine"));
}

#[test]
fn test_resolver_precedence_through_engine() {
    let clock = ManualClock::default();
    let mut engine = engine(memory_cache(), Arc::new(InMemoryRemoteStore::disabled()), &clock);
    engine.start();

    let inbox = EntityId::new("inbox-1");
    engine.add_entity(Entity::with_id(inbox.clone(), "Support", &[]));

    assert_eq!(engine.resolve(&inbox, keys::DEFAULT_VIEW, "all".to_string()), "all");

    let mut preferences = engine.read().preferences.clone();
    preferences.inbox_defaults.insert(keys::DEFAULT_VIEW.to_string(), json!("starred"));
    engine.update(DocumentPatch::new().with_preferences(preferences), WriteMode::Debounced);
    assert_eq!(engine.resolve(&inbox, keys::DEFAULT_VIEW, "all".to_string()), "starred");

    engine.set_override(&inbox, keys::DEFAULT_VIEW, "unread");
    assert_eq!(engine.resolve(&inbox, keys::DEFAULT_VIEW, "all".to_string()), "unread");

    engine.clear_override(&inbox, keys::DEFAULT_VIEW);
    assert!(!engine.read().entity_overrides.contains_key(&inbox));
    assert_eq!(
        resolver::resolve(engine.read(), &inbox, keys::DEFAULT_VIEW, "all".to_string()),
        "starred"
    );
}

#[test]
fn test_slugs_stay_unique() {
    let clock = ManualClock::default();
    let mut engine = engine(memory_cache(), Arc::new(InMemoryRemoteStore::disabled()), &clock);
    engine.start();

    for _ in 0..3 {
        let entity = Entity::new("My Inbox", &engine.read().entities);
        engine.add_entity(entity);
    }

    let slugs: Vec<&str> = engine.read().entities.iter().map(|e| e.slug.as_str()).collect();
    assert_eq!(slugs, vec!["my-inbox", "my-inbox-2", "my-inbox-3"]);
    assert_eq!(engine.read().entities.iter().filter(|e| e.selected).count(), 1);
}

#[test]
fn test_draft_lifecycle() {
    let clock = ManualClock::default();
    let remote = Arc::new(InMemoryRemoteStore::new());
    let mut session = Session::new(
        memory_cache(),
        remote.clone(),
        Arc::new(clock.clone()),
        SyncSettings::default(),
    );
    session.start();
    let id = ConversationId::new("thread-42");

    {
        let (drafts, _) = session.drafts_mut();
        drafts.save("thread-42", "Hi");
        drafts.save("thread-42", "Hi there");
    }
    clock.advance_ms(5000);
    session.tick();
    clock.advance_ms(1000);
    session.tick();

    assert_eq!(remote.push_count(), 1);
    {
        let (drafts, engine) = session.drafts_mut();
        assert_eq!(drafts.load(engine, &id), Some("Hi there"));
        assert!(drafts.has_draft(engine, &id));

        // Saving empty content keeps the record but reports no draft
        drafts.save("thread-42", "");
    }
    clock.advance_ms(5000);
    session.tick();
    {
        let (drafts, engine) = session.drafts_mut();
        assert_eq!(drafts.load(engine, &id), Some(""));
        assert!(!drafts.has_draft(engine, &id));
        assert!(engine.read().drafts.contains_key(&id));

        drafts.discard(engine, &id);
        assert!(!engine.read().drafts.contains_key(&id));
    }

    assert_eq!(session.shutdown(), SaveOutcome::Saved);
    assert!(remote.document().unwrap().drafts.is_empty());
}

#[test]
fn test_server_rejects_malformed_document() {
    let dir = TempDir::new().unwrap();
    let store = FileConfigStore::new(
        dir.path().join("config.json"),
        DeploymentDefaults::default().with_remote_storage(true),
    );

    assert!(store.save_value(json!({"entities": [{"displayName": "No id"}]})).is_err());
    assert!(store.save_value(json!({"entities": 3})).is_err());
    assert!(store.save_value(json!({"preferences": {"theme": "x"}})).is_err());

    let saved = store
        .save_value(json!({"entities": [{"id": "a", "displayName": "Ops"}], "preferences": {}}))
        .unwrap();
    assert_eq!(saved.entities[0].slug, "ops");
    assert_eq!(saved.version, "1.0.0");
}

#[test]
fn test_duplicate_inboxes_are_repaired_before_push() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::default();
    let remote = Arc::new(FileConfigStore::new(
        dir.path().join("config.json"),
        DeploymentDefaults::default().with_remote_storage(true),
    ));
    let mut client = engine(memory_cache(), remote.clone(), &clock);
    client.start();

    let entities = vec![
        Entity::with_id(EntityId::new("a"), "Support", &[]),
        Entity::with_id(EntityId::new("b"), "Support", &[]),
        Entity::with_id(EntityId::new("a"), "Support", &[]),
    ];
    let outcome = client.update(DocumentPatch::new().with_entities(entities), WriteMode::Immediate);
    assert_eq!(outcome, SaveOutcome::Saved);
    assert!(!client.is_pending());

    let stored = remote.pull().unwrap().unwrap();
    let slugs: Vec<&str> = stored.entities.iter().map(|e| e.slug.as_str()).collect();
    assert_eq!(slugs, vec!["support", "support-2"]);
}

#[test]
fn test_reset_returns_to_zero_document() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::default();
    let defaults = DeploymentDefaults::default()
        .with_remote_storage(true)
        .with_default_inbox("demo-inbox", "Demo", None);
    let remote = Arc::new(FileConfigStore::new(dir.path().join("config.json"), defaults));

    let mut client = engine(sqlite_cache(&dir, "client.db"), remote.clone(), &clock);
    client.start();
    assert_eq!(client.read().entities.len(), 1);

    assert_eq!(client.reset(), SaveOutcome::Saved);
    assert_eq!(client.read(), &ConfigDocument::default());

    // Neither store brings the old document back
    let mut fresh = engine(sqlite_cache(&dir, "client.db"), remote, &clock);
    fresh.start();
    assert_eq!(fresh.read(), &ConfigDocument::default());
}
