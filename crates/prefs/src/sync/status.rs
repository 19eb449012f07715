//! Engine lifecycle and observable sync status

use serde::Serialize;

/// Lifecycle state of the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Constructed, nothing loaded yet
    Uninitialized,
    /// Local cache loaded, remote probe/pull not finished
    Loading,
    /// Steady state
    Ready,
}

/// Sync status the UI can bind to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Remote storage disabled or unreachable; changes live in the local cache
    LocalOnly,
    /// In-memory state matches what the remote store last confirmed
    Synced,
    /// Local changes are waiting to be pushed
    Pending,
    /// The last push failed; local changes are still pending
    Failed { attempts: u32, reason: String },
}

impl SyncStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncStatus::Failed { .. })
    }
}

/// How an update reaches the remote store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Coalesce with other updates and push after the debounce window
    #[default]
    Debounced,
    /// Push right away, cancelling any scheduled debounced push
    Immediate,
}

/// Result of an update or push as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Saved locally; a push is scheduled
    Scheduled,
    /// Pushed and confirmed by the remote store
    Saved,
    /// Saved locally; remote storage is not in use
    LocalOnly,
    /// Saved locally; the push failed and the change is still pending
    Failed { reason: String, will_retry: bool },
}

impl SaveOutcome {
    /// Whether the change is as durable as the deployment allows
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Saved | SaveOutcome::LocalOnly)
    }
}

/// Result of a pull attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The remote document replaced in-memory state
    Applied,
    /// The remote document matched in-memory state, or none exists
    Unchanged,
    /// Skipped because a push is pending or in flight
    Skipped,
    /// Remote storage is disabled or the engine is not ready
    Disabled,
    /// The pull failed; in-memory state was kept
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_outcome_success() {
        assert!(SaveOutcome::Saved.is_success());
        assert!(SaveOutcome::LocalOnly.is_success());
        assert!(!SaveOutcome::Scheduled.is_success());
        assert!(
            !SaveOutcome::Failed {
                reason: "offline".to_string(),
                will_retry: true
            }
            .is_success()
        );
    }

    #[test]
    fn test_status_serialization() {
        let status = SyncStatus::Failed {
            attempts: 2,
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["attempts"], 2);

        let json = serde_json::to_value(SyncStatus::LocalOnly).unwrap();
        assert_eq!(json["state"], "local_only");
    }
}
