//! Domain models for the synchronized configuration

mod document;
mod draft;
mod entity;
mod preferences;

pub use document::{ConfigDocument, ConversationId, DocumentPatch};
pub use draft::Draft;
pub use entity::{Entity, EntityId, slugify, unique_slug};
pub use preferences::{NotificationPrefs, Preferences, SettingMap};
