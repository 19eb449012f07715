//! Draft model for in-progress replies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved reply draft
///
/// Empty `content` is meaningful: the user cleared the draft. That is
/// distinct from having no entry at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub content: String,
    pub last_saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(content: impl Into<String>, last_saved_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            last_saved_at,
        }
    }

    /// Check if the draft has visible content (whitespace does not count)
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_content() {
        let now = Utc::now();
        assert!(Draft::new("hello", now).has_content());
        assert!(!Draft::new("", now).has_content());
        assert!(!Draft::new("  \n\t", now).has_content());
    }

    #[test]
    fn test_serialization() {
        let draft = Draft::new("hi", Utc::now());
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["content"], "hi");
        assert!(json.get("lastSavedAt").is_some());
    }
}
