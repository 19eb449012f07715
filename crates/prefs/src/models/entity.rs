//! Entity model representing a configured inbox

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback slug used when a display name has no usable characters
const FALLBACK_SLUG: &str = "inbox";

/// Stable unique identifier for an entity (never reassigned)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An inbox the user manages
///
/// Connection parameters are opaque to the sync engine and are kept in
/// `params`, flattened into the same JSON object as the known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Immutable identifier
    pub id: EntityId,
    /// Human-readable identifier, unique within a document
    #[serde(default)]
    pub slug: String,
    /// Name shown in the inbox list
    pub display_name: String,
    /// Whether this is the currently selected inbox
    #[serde(default)]
    pub selected: bool,
    /// Entity-specific connection parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Entity {
    /// Create a new entity with a fresh id and a slug unique among `existing`
    pub fn new(display_name: impl Into<String>, existing: &[Entity]) -> Self {
        Self::with_id(EntityId::generate(), display_name, existing)
    }

    /// Create an entity with a known id (pre-provisioned or imported)
    pub fn with_id(id: EntityId, display_name: impl Into<String>, existing: &[Entity]) -> Self {
        let display_name = display_name.into();
        let slug = unique_slug(&display_name, existing, None);
        Self {
            id,
            slug,
            display_name,
            selected: false,
            params: Map::new(),
        }
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set as selected
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Rename the entity, regenerating its slug against the other entities
    pub fn rename(&mut self, display_name: impl Into<String>, existing: &[Entity]) {
        self.display_name = display_name.into();
        self.slug = unique_slug(&self.display_name, existing, Some(&self.id));
    }
}

/// Convert a display name into a URL-friendly slug
///
/// Lowercases ASCII letters, keeps digits, and collapses every other run of
/// characters into a single dash. Leading and trailing dashes are trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Compute a slug for `name` that does not collide with any entity in
/// `existing`, ignoring the entity identified by `exclude`.
///
/// Collisions are resolved with a numeric suffix starting at 2
/// (`my-inbox`, `my-inbox-2`, `my-inbox-3`, ...).
pub fn unique_slug(name: &str, existing: &[Entity], exclude: Option<&EntityId>) -> String {
    let base = slugify(name);
    let taken = |candidate: &str| {
        existing
            .iter()
            .filter(|e| Some(&e.id) != exclude)
            .any(|e| e.slug == candidate)
    };

    if !taken(&base) {
        return base;
    }

    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
