//! Per-inbox setting resolution
//!
//! A setting is looked up in three layers, first hit wins:
//! 1. the inbox's override record (`entityOverrides[id][key]`)
//! 2. the global inbox defaults (`preferences.inboxDefaults[key]`)
//! 3. the caller's hardcoded default
//!
//! A JSON `null` in either layer counts as "not set". All functions here are
//! pure: mutators return a new document and the caller persists it.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{ConfigDocument, EntityId};

/// Well-known per-inbox setting keys
pub mod keys {
    /// Initial thread filter ("all", "unread", "starred")
    pub const DEFAULT_VIEW: &str = "defaultView";
    /// Thread sort order ("newest", "oldest")
    pub const SORT_ORDER: &str = "sortOrder";
    /// Threads loaded per page
    pub const PAGE_SIZE: &str = "pageSize";
    /// Notify on new mail in this inbox
    pub const NOTIFY_NEW_MAIL: &str = "notifyNewMail";
    /// Reply signature
    pub const SIGNATURE: &str = "signature";
}

/// Find the raw value of `key` for `entity`, or `None` if no layer sets it
pub fn resolve_value<'a>(
    doc: &'a ConfigDocument,
    entity: &EntityId,
    key: &str,
) -> Option<&'a Value> {
    let set = |value: &&Value| !value.is_null();

    doc.entity_overrides
        .get(entity)
        .and_then(|settings| settings.get(key))
        .filter(set)
        .or_else(|| doc.preferences.inbox_defaults.get(key).filter(set))
}

/// Resolve `key` for `entity` as a `T`, falling back to `default`
///
/// A layer whose value does not have the expected shape is skipped, so a
/// bad override cannot hide a valid global default.
pub fn resolve<T: DeserializeOwned>(
    doc: &ConfigDocument,
    entity: &EntityId,
    key: &str,
    default: T,
) -> T {
    let override_value = doc
        .entity_overrides
        .get(entity)
        .and_then(|settings| settings.get(key));
    let default_value = doc.preferences.inbox_defaults.get(key);

    [override_value, default_value]
        .into_iter()
        .flatten()
        .filter(|value| !value.is_null())
        .find_map(|value| T::deserialize(value).ok())
        .unwrap_or(default)
}

/// Return a copy of `doc` with `key` overridden for `entity`
pub fn set_override(
    doc: &ConfigDocument,
    entity: &EntityId,
    key: &str,
    value: impl Into<Value>,
) -> ConfigDocument {
    let mut next = doc.clone();
    next.entity_overrides
        .entry(entity.clone())
        .or_default()
        .insert(key.to_string(), value.into());
    next
}

/// Return a copy of `doc` without the override of `key` for `entity`
///
/// An override record left empty is removed entirely.
pub fn clear_override(doc: &ConfigDocument, entity: &EntityId, key: &str) -> ConfigDocument {
    let mut next = doc.clone();
    if let Some(settings) = next.entity_overrides.get_mut(entity) {
        settings.remove(key);
        if settings.is_empty() {
            next.entity_overrides.remove(entity);
        }
    }
    next
}
