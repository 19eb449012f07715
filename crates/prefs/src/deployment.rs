//! Deployment-time defaults
//!
//! Supports loading deployment settings from (in order of priority):
//! 1. JSON file (~/.config/inboxkit/deployment.json)
//! 2. Runtime environment variables (fallback)
//!
//! These settings only matter to the remote persistence side: they switch
//! remote storage on or off, say where the document lives, and provide the
//! inbox and credential a fresh deployment starts with.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{ConfigDocument, Entity, EntityId, Preferences};

/// Deployment settings filename in the Inboxkit config directory
const DEPLOYMENT_FILE: &str = "deployment.json";

/// Name of the persisted document inside the storage directory
pub const DOCUMENT_FILE: &str = "config.json";

/// Environment variable names
pub mod env {
    pub const REMOTE_STORAGE: &str = "INBOXKIT_REMOTE_STORAGE";
    pub const STORAGE_DIR: &str = "INBOXKIT_STORAGE_DIR";
    pub const DEFAULT_INBOX_ID: &str = "INBOXKIT_DEFAULT_INBOX_ID";
    pub const DEFAULT_INBOX_NAME: &str = "INBOXKIT_DEFAULT_INBOX_NAME";
    pub const DEFAULT_INBOX_ADDRESS: &str = "INBOXKIT_DEFAULT_INBOX_ADDRESS";
    pub const API_KEY: &str = "INBOXKIT_API_KEY";
    pub const DEFAULT_THEME: &str = "INBOXKIT_DEFAULT_THEME";
}

/// Inbox provisioned by the deployment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultInbox {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Settings fixed at deployment time
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDefaults {
    /// Whether the remote persistence endpoint stores anything
    #[serde(default)]
    pub remote_storage: bool,
    /// Directory holding the persisted document
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub default_inbox: Option<DefaultInbox>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_theme: Option<String>,
}

impl DeploymentDefaults {
    /// Load defaults using the following priority:
    /// 1. JSON file (~/.config/inboxkit/deployment.json)
    /// 2. Runtime environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(DEPLOYMENT_FILE) {
            return config::load_json(DEPLOYMENT_FILE);
        }
        Ok(Self::from_env())
    }

    /// Load defaults from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Load defaults from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load defaults through an arbitrary variable lookup
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let default_inbox = get(env::DEFAULT_INBOX_ID).map(|id| DefaultInbox {
            id,
            name: get(env::DEFAULT_INBOX_NAME),
            address: get(env::DEFAULT_INBOX_ADDRESS),
        });

        Self {
            remote_storage: get(env::REMOTE_STORAGE).is_some_and(|v| is_truthy(&v)),
            storage_dir: get(env::STORAGE_DIR).map(PathBuf::from),
            default_inbox,
            api_key: get(env::API_KEY),
            default_theme: get(env::DEFAULT_THEME),
        }
    }

    pub fn with_remote_storage(mut self, enabled: bool) -> Self {
        self.remote_storage = enabled;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    pub fn with_default_inbox(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        address: Option<String>,
    ) -> Self {
        self.default_inbox = Some(DefaultInbox {
            id: id.into(),
            name: Some(name.into()),
            address,
        });
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_default_theme(mut self, theme: impl Into<String>) -> Self {
        self.default_theme = Some(theme.into());
        self
    }

    /// Directory holding the persisted document
    ///
    /// Falls back to the Inboxkit config directory.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(config::config_dir)
    }

    /// Path of the persisted document
    pub fn document_path(&self) -> Option<PathBuf> {
        self.storage_dir().map(|dir| dir.join(DOCUMENT_FILE))
    }

    /// The document a fresh deployment starts from
    ///
    /// Contains the provisioned inbox (selected), the provisioned credential
    /// and the default theme; fields without a default stay empty.
    pub fn seed_document(&self) -> ConfigDocument {
        let mut doc = ConfigDocument {
            credential: self.api_key.clone(),
            ..Default::default()
        };

        if let Some(inbox) = &self.default_inbox {
            let name = inbox.name.clone().unwrap_or_else(|| inbox.id.clone());
            let mut entity = Entity::with_id(EntityId::new(inbox.id.clone()), name, &[])
                .with_selected(true);
            if let Some(address) = &inbox.address {
                entity = entity.with_param("address", address.clone());
            }
            doc.entities.push(entity);
        }

        if let Some(theme) = &self.default_theme {
            doc.preferences = Preferences::default().with_theme(theme.clone());
        }

        doc
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let defaults = DeploymentDefaults::from_lookup(lookup(&[
            (env::REMOTE_STORAGE, "TRUE"),
            (env::STORAGE_DIR, "/data"),
            (env::DEFAULT_INBOX_ID, "inbox-1"),
            (env::DEFAULT_INBOX_NAME, "Demo"),
            (env::API_KEY, "key-123"),
            (env::DEFAULT_THEME, " "),
        ]));

        assert!(defaults.remote_storage);
        assert_eq!(defaults.storage_dir, Some(PathBuf::from("/data")));
        assert_eq!(defaults.document_path(), Some(PathBuf::from("/data/config.json")));
        let inbox = defaults.default_inbox.unwrap();
        assert_eq!(inbox.id, "inbox-1");
        assert_eq!(inbox.name.as_deref(), Some("Demo"));
        assert!(inbox.address.is_none());
        assert_eq!(defaults.api_key.as_deref(), Some("key-123"));
        assert!(defaults.default_theme.is_none());
    }

    #[test]
    fn test_remote_storage_off_by_default() {
        let defaults = DeploymentDefaults::from_lookup(lookup(&[]));
        assert_eq!(defaults, DeploymentDefaults::default());

        let defaults = DeploymentDefaults::from_lookup(lookup(&[(env::REMOTE_STORAGE, "no")]));
        assert!(!defaults.remote_storage);
    }

    #[test]
    fn test_seed_document() {
        let defaults = DeploymentDefaults::default()
            .with_default_inbox("inbox-1", "Demo", Some("demo@example.com".to_string()))
            .with_api_key("key-123")
            .with_default_theme("dark");

        let doc = defaults.seed_document();
        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].id.as_str(), "inbox-1");
        assert_eq!(doc.entities[0].slug, "demo");
        assert!(doc.entities[0].selected);
        assert_eq!(doc.entities[0].params["address"], "demo@example.com");
        assert_eq!(doc.credential.as_deref(), Some("key-123"));
        assert_eq!(doc.preferences.theme.as_deref(), Some("dark"));
    }

    #[test]
    fn test_seed_document_without_defaults_is_zero() {
        assert_eq!(DeploymentDefaults::default().seed_document(), ConfigDocument::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        std::fs::write(
            &path,
            r#"{"remoteStorage": true, "defaultInbox": {"id": "a", "name": "A"}}"#,
        )
        .unwrap();

        let defaults = DeploymentDefaults::from_file(&path).unwrap();
        assert!(defaults.remote_storage);
        assert_eq!(defaults.default_inbox.unwrap().id, "a");
    }
}
