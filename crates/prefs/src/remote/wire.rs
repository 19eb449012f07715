//! Wire format of the remote persistence endpoint
//!
//! ```text
//! GET    /api/config  -> {"enabled": bool, "config"?: Document}
//! POST   /api/config  -> {"success": true, "config": Document}
//!                        {"success": false, "error": "..."}   (4xx/5xx)
//! DELETE /api/config  -> {"success": true}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ConfigDocument;

/// Path of the configuration resource
pub const CONFIG_PATH: &str = "api/config";

/// Response to a load request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDocument>,
}

/// Response to a save request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn saved(config: ConfigDocument) -> Self {
        Self {
            success: true,
            config: Some(config),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            config: None,
            error: Some(error.into()),
        }
    }
}

/// Response to a delete request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structural problems in a submitted document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("configuration must be a JSON object")]
    NotAnObject,
    #[error("entities is required")]
    MissingEntities,
    #[error("entities must be an array")]
    EntitiesNotArray,
    #[error("entity at index {index} must be an object")]
    EntityNotObject { index: usize },
    #[error("entity at index {index} is missing an id")]
    MissingId { index: usize },
    #[error("entity at index {index} is missing a display name")]
    MissingDisplayName { index: usize },
    #[error("duplicate entity id {id}")]
    DuplicateId { id: String },
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Check the structural minimums of a submitted document
///
/// `entities` must be present and an array, and every entity needs a
/// non-empty `id` and `displayName`.
pub fn validate_payload(payload: &Value) -> Result<(), ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let entities = match object.get("entities") {
        None => return Err(ValidationError::MissingEntities),
        Some(Value::Array(entities)) => entities,
        Some(_) => return Err(ValidationError::EntitiesNotArray),
    };

    let mut seen = std::collections::HashSet::new();
    for (index, entity) in entities.iter().enumerate() {
        let entity = entity
            .as_object()
            .ok_or(ValidationError::EntityNotObject { index })?;

        let id = non_empty_str(entity.get("id")).ok_or(ValidationError::MissingId { index })?;
        if non_empty_str(entity.get("displayName")).is_none() {
            return Err(ValidationError::MissingDisplayName { index });
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId { id: id.to_string() });
        }
    }

    Ok(())
}

/// Validate then deserialize a submitted document
pub fn parse_payload(payload: Value) -> Result<ConfigDocument, ValidationError> {
    validate_payload(&payload)?;
    serde_json::from_value(payload).map_err(|e| ValidationError::Malformed(e.to_string()))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
