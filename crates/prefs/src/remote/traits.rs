//! Remote store trait and error type

use crate::models::ConfigDocument;

/// Errors at the remote storage boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Remote storage is switched off for this deployment
    #[error("remote storage is disabled")]
    Disabled,
    /// The request did not complete within the configured timeout
    #[error("remote request timed out")]
    Timeout,
    /// Transport-level failure (connection refused, DNS, reset, ...)
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with an error status
    #[error("remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The server answered with something that is not a valid response
    #[error("invalid response from remote store: {0}")]
    InvalidResponse(String),
    /// The backing storage failed
    #[error("remote storage failure: {0}")]
    Storage(String),
}

impl RemoteError {
    /// Whether retrying the same request later may succeed
    ///
    /// Validation rejections (4xx) are permanent for the same payload.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Timeout | RemoteError::Network(_) | RemoteError::Storage(_) => true,
            RemoteError::Rejected { status, .. } => *status >= 500,
            RemoteError::Disabled | RemoteError::InvalidResponse(_) => false,
        }
    }
}

/// Trait for the remote persisted configuration store
///
/// `pull` returning `Ok(None)` means there is nothing to merge: no document
/// exists yet or remote storage is disabled.
pub trait RemoteStore: Send + Sync {
    /// Check whether remote storage is enabled for this deployment
    fn probe(&self) -> Result<bool, RemoteError>;

    /// Fetch the persisted document
    fn pull(&self) -> Result<Option<ConfigDocument>, RemoteError>;

    /// Persist `doc`, returning it as stored (with the store's version and
    /// timestamp)
    fn push(&self, doc: &ConfigDocument) -> Result<ConfigDocument, RemoteError>;

    /// Remove the persisted document
    fn delete(&self) -> Result<(), RemoteError>;
}
