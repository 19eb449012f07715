//! The configuration document, the single synchronized unit

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Draft, Entity, EntityId, Preferences, SettingMap, unique_slug};

/// Identifier of a conversation a draft belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Full configuration payload synchronized between the local cache and the
/// remote store
///
/// `Default` is the zero-value document used when nothing is stored yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Version tag assigned by the store on every save
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Save timestamp assigned by the store (server authoritative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// API credential; replaced as a whole, never merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Configured inboxes in display order
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Global preference groups
    #[serde(default)]
    pub preferences: Preferences,
    /// Per-inbox partial preference records
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entity_overrides: BTreeMap<EntityId, SettingMap>,
    /// In-progress reply drafts by conversation
    #[serde(default)]
    pub drafts: BTreeMap<ConversationId, Draft>,
}

impl ConfigDocument {
    /// Find an entity by id
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }

    /// The currently selected entity, if any
    pub fn selected_entity(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.selected)
    }

    /// Entities in display order
    ///
    /// Follows `preferences.inbox_order` when set; entities missing from the
    /// custom order keep their insertion order after the ordered ones.
    pub fn ordered_entities(&self) -> Vec<&Entity> {
        let Some(order) = &self.preferences.inbox_order else {
            return self.entities.iter().collect();
        };

        let mut ordered: Vec<&Entity> = order.iter().filter_map(|id| self.entity(id)).collect();
        for entity in &self.entities {
            if !order.contains(&entity.id) {
                ordered.push(entity);
            }
        }
        ordered
    }

    /// Enforce the single-selection invariant.
    ///
    /// When several entities are selected the first one keeps the selection;
    /// when none is selected the first entity becomes selected.
    /// Returns `true` if any flag changed.
    pub fn normalize_selection(&mut self) -> bool {
        let keep = self
            .entities
            .iter()
            .position(|e| e.selected)
            .or(if self.entities.is_empty() { None } else { Some(0) });

        let mut changed = false;
        for (i, entity) in self.entities.iter_mut().enumerate() {
            let selected = Some(i) == keep;
            if entity.selected != selected {
                entity.selected = selected;
                changed = true;
            }
        }
        changed
    }

    /// Drop entities whose id repeats an earlier entity's id
    ///
    /// Returns how many entities were removed.
    pub fn dedupe_ids(&mut self) -> usize {
        let before = self.entities.len();
        let mut seen = HashSet::new();
        self.entities.retain(|e| seen.insert(e.id.clone()));
        before - self.entities.len()
    }

    /// Make every slug non-empty and unique
    ///
    /// A missing slug is derived from the display name. When two entities
    /// share a slug the earlier one keeps it and the later one gets a new one.
    /// Expects unique ids.
    pub fn repair_slugs(&mut self) {
        for i in 0..self.entities.len() {
            let slug = &self.entities[i].slug;
            let clashes = self.entities[..i].iter().any(|e| &e.slug == slug);
            if slug.is_empty() || clashes {
                let slug = unique_slug(
                    &self.entities[i].display_name,
                    &self.entities,
                    Some(&self.entities[i].id),
                );
                self.entities[i].slug = slug;
            }
        }
    }

    /// Drop per-entity override records that have become empty
    pub fn prune_overrides(&mut self) {
        self.entity_overrides.retain(|_, settings| !settings.is_empty());
    }

    /// Restore the document invariants after a change
    ///
    /// Unique ids, unique non-empty slugs, a single selection and no empty
    /// override records.
    pub fn normalize(&mut self) {
        self.dedupe_ids();
        self.repair_slugs();
        self.normalize_selection();
        self.prune_overrides();
    }
}

/// Partial document applied by the sync engine's `update`
///
/// The merge is shallow per top-level key: a field set here replaces the
/// whole corresponding field of the document. Callers that want to keep
/// existing entries must start from the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    /// `Some(None)` clears the credential
    pub credential: Option<Option<String>>,
    pub entities: Option<Vec<Entity>>,
    pub preferences: Option<Preferences>,
    pub entity_overrides: Option<BTreeMap<EntityId, SettingMap>>,
    pub drafts: Option<BTreeMap<ConversationId, Draft>>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = Some(entities);
        self
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_entity_overrides(mut self, overrides: BTreeMap<EntityId, SettingMap>) -> Self {
        self.entity_overrides = Some(overrides);
        self
    }

    pub fn with_drafts(mut self, drafts: BTreeMap<ConversationId, Draft>) -> Self {
        self.drafts = Some(drafts);
        self
    }

    /// Check if the patch touches nothing
    pub fn is_empty(&self) -> bool {
        self.credential.is_none()
            && self.entities.is_none()
            && self.preferences.is_none()
            && self.entity_overrides.is_none()
            && self.drafts.is_none()
    }

    /// Merge the patch into `doc`
    pub fn apply(self, doc: &mut ConfigDocument) {
        if let Some(credential) = self.credential {
            doc.credential = credential;
        }
        if let Some(entities) = self.entities {
            doc.entities = entities;
        }
        if let Some(preferences) = self.preferences {
            doc.preferences = preferences;
        }
        if let Some(overrides) = self.entity_overrides {
            doc.entity_overrides = overrides;
        }
        if let Some(drafts) = self.drafts {
            doc.drafts = drafts;
        }
        doc.prune_overrides();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with(names: &[&str]) -> ConfigDocument {
        let mut doc = ConfigDocument::default();
        for name in names {
            let entity = Entity::new(*name, &doc.entities);
            doc.entities.push(entity);
        }
        doc
    }

    #[test]
    fn test_zero_document_shape() {
        let doc = ConfigDocument::default();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, json!({"entities": [], "preferences": {}, "drafts": {}}));
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let doc: ConfigDocument = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, ConfigDocument::default());
    }

    #[test]
    fn test_normalize_selection_picks_first_when_none() {
        let mut doc = doc_with(&["A", "B"]);
        assert!(doc.normalize_selection());
        assert!(doc.entities[0].selected);
        assert!(!doc.entities[1].selected);
        assert!(!doc.normalize_selection());
    }

    #[test]
    fn test_normalize_selection_keeps_single_selection() {
        let mut doc = doc_with(&["A", "B", "C"]);
        doc.entities[1].selected = true;
        doc.entities[2].selected = true;

        doc.normalize_selection();

        let selected: Vec<_> = doc.entities.iter().filter(|e| e.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].display_name, "B");
    }

    #[test]
    fn test_repair_fills_missing_slugs() {
        let mut doc = doc_with(&["Support"]);
        let mut imported = Entity::with_id(EntityId::new("x"), "Support", &[]);
        imported.slug.clear();
        doc.entities.push(imported);

        doc.repair_slugs();

        assert_eq!(doc.entities[0].slug, "support");
        assert_eq!(doc.entities[1].slug, "support-2");
    }

    #[test]
    fn test_normalize_resolves_slug_collisions() {
        let mut doc = ConfigDocument::default();
        doc.entities.push(Entity::with_id(EntityId::new("x"), "Support", &[]));
        doc.entities.push(Entity::with_id(EntityId::new("y"), "Support", &[]));
        doc.entities.push(Entity::with_id(EntityId::new("z"), "Support 2", &[]));
        assert_eq!(doc.entities[1].slug, "support");

        doc.normalize();

        let slugs: Vec<_> = doc.entities.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["support", "support-3", "support-2"]);
    }

    #[test]
    fn test_normalize_drops_duplicate_ids() {
        let mut doc = ConfigDocument::default();
        doc.entities.push(Entity::with_id(EntityId::new("x"), "First", &[]));
        doc.entities.push(Entity::with_id(EntityId::new("x"), "Second", &[]));

        assert_eq!(doc.dedupe_ids(), 1);
        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].display_name, "First");
    }

    #[test]
    fn test_ordered_entities() {
        let mut doc = doc_with(&["A", "B", "C"]);
        let c = doc.entities[2].id.clone();
        let a = doc.entities[0].id.clone();
        doc.preferences.inbox_order = Some(vec![c, EntityId::new("gone"), a]);

        let names: Vec<_> = doc
            .ordered_entities()
            .iter()
            .map(|e| e.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_patch_is_shallow() {
        let mut doc = ConfigDocument::default();
        doc.preferences = Preferences::default()
            .with_theme("dark")
            .with_inbox_default("defaultView", "all");

        let patch = DocumentPatch::new().with_preferences(Preferences::default().with_theme("light"));
        patch.apply(&mut doc);

        assert_eq!(doc.preferences.theme.as_deref(), Some("light"));
        assert!(doc.preferences.inbox_defaults.is_empty());
    }

    #[test]
    fn test_patch_clears_credential_and_prunes_overrides() {
        let mut doc = ConfigDocument {
            credential: Some("secret".to_string()),
            ..Default::default()
        };
        let mut overrides = BTreeMap::new();
        overrides.insert(EntityId::new("a"), SettingMap::new());

        DocumentPatch::new()
            .with_credential(None)
            .with_entity_overrides(overrides)
            .apply(&mut doc);

        assert!(doc.credential.is_none());
        assert!(doc.entity_overrides.is_empty());
    }
}
