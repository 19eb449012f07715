//! Preference groups stored in the configuration document

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EntityId;

/// A partial record of named settings (e.g. `{"defaultView": "unread"}`)
pub type SettingMap = BTreeMap<String, Value>;

/// Named preference groups
///
/// Every field is optional: absence means "use the hardcoded default",
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// UI theme name ("light", "dark", "system", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Global defaults for per-inbox settings, consulted by the resolver
    /// after per-inbox overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inbox_defaults: SettingMap,
    /// Notification toggles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationPrefs>,
    /// Custom inbox ordering (overrides insertion order when present)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_order: Option<Vec<EntityId>>,
    /// Preference groups this version does not know about, kept verbatim
    #[serde(flatten)]
    pub extra: SettingMap,
}

impl Preferences {
    /// Set the theme
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Set a global default for a per-inbox setting
    pub fn with_inbox_default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inbox_defaults.insert(key.into(), value.into());
        self
    }

    /// Set the notification toggles
    pub fn with_notifications(mut self, notifications: NotificationPrefs) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Set a custom inbox ordering
    pub fn with_inbox_order(mut self, order: Vec<EntityId>) -> Self {
        self.inbox_order = Some(order);
        self
    }

    /// Check if no preference has been set
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.inbox_defaults.is_empty()
            && self.notifications.is_none()
            && self.inbox_order.is_none()
            && self.extra.is_empty()
    }
}

/// Notification toggles
///
/// Delivery is not implemented; these are stored so the UI can round-trip
/// the user's choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_mail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<bool>,
}
