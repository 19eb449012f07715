//! Local cache of the configuration document
//!
//! The document is stored across a fixed set of named slots so that older
//! consumers can still read individual fields, while the sync engine always
//! treats it as one logical document.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::LocalStore;
use crate::models::{ConfigDocument, ConversationId, Draft, Entity, EntityId, Preferences, SettingMap};

/// Named slots in the local store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSlot {
    Entities,
    Credential,
    Preferences,
    EntityOverrides,
    Drafts,
    Metadata,
    LastSync,
}

impl LocalSlot {
    /// Slots that together make up the document
    pub const DOCUMENT: [LocalSlot; 6] = [
        LocalSlot::Entities,
        LocalSlot::Credential,
        LocalSlot::Preferences,
        LocalSlot::EntityOverrides,
        LocalSlot::Drafts,
        LocalSlot::Metadata,
    ];

    /// Storage key of the slot
    pub fn key(self) -> &'static str {
        match self {
            LocalSlot::Entities => "inboxkit.inboxes",
            LocalSlot::Credential => "inboxkit.apiKey",
            LocalSlot::Preferences => "inboxkit.preferences",
            LocalSlot::EntityOverrides => "inboxkit.inboxOverrides",
            LocalSlot::Drafts => "inboxkit.drafts",
            LocalSlot::Metadata => "inboxkit.meta",
            LocalSlot::LastSync => "inboxkit.lastSync",
        }
    }
}

/// Version metadata kept beside the document fields
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMetadata {
    #[serde(default)]
    version: String,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Reads and writes the configuration document to a [`LocalStore`]
///
/// Failures never reach the caller: a document that cannot be read is
/// treated as absent, and a failed write is logged.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn LocalStore>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Read the cached document
    ///
    /// Returns the zero-value document when nothing is stored or when any
    /// slot fails to parse.
    pub fn read(&self) -> ConfigDocument {
        match self.try_read() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Discarding unreadable local configuration: {:#}", e);
                ConfigDocument::default()
            }
        }
    }

    fn try_read(&self) -> Result<ConfigDocument> {
        let entities: Option<Vec<Entity>> = self.read_slot(LocalSlot::Entities)?;
        let credential: Option<Option<String>> = self.read_slot(LocalSlot::Credential)?;
        let preferences: Option<Preferences> = self.read_slot(LocalSlot::Preferences)?;
        let overrides: Option<BTreeMap<EntityId, SettingMap>> =
            self.read_slot(LocalSlot::EntityOverrides)?;
        let drafts: Option<BTreeMap<ConversationId, Draft>> = self.read_slot(LocalSlot::Drafts)?;
        let metadata: Option<DocumentMetadata> = self.read_slot(LocalSlot::Metadata)?;
        let metadata = metadata.unwrap_or_default();

        let mut doc = ConfigDocument {
            version: metadata.version,
            last_updated: metadata.last_updated,
            credential: credential.flatten(),
            entities: entities.unwrap_or_default(),
            preferences: preferences.unwrap_or_default(),
            entity_overrides: overrides.unwrap_or_default(),
            drafts: drafts.unwrap_or_default(),
        };
        doc.prune_overrides();
        Ok(doc)
    }

    /// Read a single slot, for consumers that only need one field
    pub fn read_slot<T: DeserializeOwned>(&self, slot: LocalSlot) -> Result<Option<T>> {
        let Some(raw) = self.store.get(slot.key())? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse local slot {}", slot.key()))?;
        Ok(Some(value))
    }

    /// Write the whole document, replacing every document slot
    pub fn write(&self, doc: &ConfigDocument) {
        if let Err(e) = self.try_write(doc) {
            warn!("Failed to write local configuration: {:#}", e);
        }
    }

    fn try_write(&self, doc: &ConfigDocument) -> Result<()> {
        let metadata = DocumentMetadata {
            version: doc.version.clone(),
            last_updated: doc.last_updated,
        };

        let entries = [
            (LocalSlot::Entities.key(), serde_json::to_string(&doc.entities)?),
            (LocalSlot::Credential.key(), serde_json::to_string(&doc.credential)?),
            (LocalSlot::Preferences.key(), serde_json::to_string(&doc.preferences)?),
            (
                LocalSlot::EntityOverrides.key(),
                serde_json::to_string(&doc.entity_overrides)?,
            ),
            (LocalSlot::Drafts.key(), serde_json::to_string(&doc.drafts)?),
            (LocalSlot::Metadata.key(), serde_json::to_string(&metadata)?),
        ];

        self.store.set_many(&entries)?;
        debug!("Wrote local configuration ({} inboxes)", doc.entities.len());
        Ok(())
    }

    /// Remember when the document was last confirmed against the remote store
    pub fn record_last_sync(&self, at: DateTime<Utc>) {
        let result = serde_json::to_string(&at)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(LocalSlot::LastSync.key(), &raw));
        if let Err(e) = result {
            warn!("Failed to record last sync time: {:#}", e);
        }
    }

    /// When the document was last confirmed against the remote store
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.read_slot(LocalSlot::LastSync).ok().flatten()
    }

    /// Remove the cached document and sync timestamp
    pub fn clear(&self) {
        for slot in LocalSlot::DOCUMENT.into_iter().chain([LocalSlot::LastSync]) {
            if let Err(e) = self.store.remove(slot.key()) {
                warn!("Failed to clear local slot {}: {:#}", slot.key(), e);
            }
        }
    }
}
