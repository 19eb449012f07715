//! HTTP client for the remote persistence endpoint
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Every request is
//! bounded by a global timeout so a stalled server cannot hold a push or
//! pull open indefinitely.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::time::Duration;
use url::Url;

use super::wire::{CONFIG_PATH, DeleteResponse, LoadResponse, SaveResponse};
use super::{RemoteError, RemoteStore};
use crate::models::ConfigDocument;
use crate::sync::{DEFAULT_REQUEST_TIMEOUT, SyncSettings};

/// Remote store reached over HTTP
pub struct HttpRemoteStore {
    agent: ureq::Agent,
    endpoint: Url,
    timeout: Duration,
}

impl HttpRemoteStore {
    /// Create a client for the endpoint mounted under `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client bounded by the request timeout of `settings`
    pub fn from_settings(base_url: &str, settings: &SyncSettings) -> Result<Self> {
        Self::with_timeout(base_url, settings.request_timeout)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid remote store URL: {}", base_url))?;

        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let endpoint = base
            .join(CONFIG_PATH)
            .context("Failed to build configuration endpoint URL")?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint,
            timeout,
        })
    }

    /// Upper bound on every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of the configuration resource
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn load(&self) -> Result<LoadResponse, RemoteError> {
        let mut response = self
            .agent
            .get(self.endpoint.as_str())
            .call()
            .map_err(transport_error)?;

        check_status(&mut response)?;
        response
            .body_mut()
            .read_json::<LoadResponse>()
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

impl RemoteStore for HttpRemoteStore {
    fn probe(&self) -> Result<bool, RemoteError> {
        Ok(self.load()?.enabled)
    }

    fn pull(&self) -> Result<Option<ConfigDocument>, RemoteError> {
        let response = self.load()?;
        if !response.enabled {
            return Ok(None);
        }
        Ok(response.config)
    }

    fn push(&self, doc: &ConfigDocument) -> Result<ConfigDocument, RemoteError> {
        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .send_json(doc)
            .map_err(transport_error)?;

        check_status(&mut response)?;
        let body: SaveResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(RemoteError::Rejected {
                status: response.status().as_u16(),
                message: body.error.unwrap_or_else(|| "save failed".to_string()),
            });
        }

        debug!("Pushed configuration to {}", self.endpoint);
        body.config
            .ok_or_else(|| RemoteError::InvalidResponse("save response without config".to_string()))
    }

    fn delete(&self) -> Result<(), RemoteError> {
        let mut response = self
            .agent
            .delete(self.endpoint.as_str())
            .call()
            .map_err(transport_error)?;

        check_status(&mut response)?;
        let body: DeleteResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        if body.success {
            Ok(())
        } else {
            Err(RemoteError::Rejected {
                status: response.status().as_u16(),
                message: body.error.unwrap_or_else(|| "delete failed".to_string()),
            })
        }
    }
}

fn transport_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Timeout(_) => RemoteError::Timeout,
        other => {
            warn!("Remote store request failed: {}", other);
            RemoteError::Network(other.to_string())
        }
    }
}

/// Turn a non-success status into `Rejected`, using the body's `error` field
/// when the server sent one
fn check_status(response: &mut ureq::http::Response<ureq::Body>) -> Result<(), RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let message = response
        .body_mut()
        .read_json::<SaveResponse>()
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    if status.as_u16() == 503 {
        // The endpoint answers 503 when remote storage is switched off
        return Err(RemoteError::Disabled);
    }

    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_with_and_without_trailing_slash() {
        let store = HttpRemoteStore::new("http://localhost:3717").unwrap();
        assert_eq!(store.endpoint().as_str(), "http://localhost:3717/api/config");

        let store = HttpRemoteStore::new("http://example.com/inboxkit").unwrap();
        assert_eq!(store.endpoint().as_str(), "http://example.com/inboxkit/api/config");

        let store = HttpRemoteStore::new("http://example.com/inboxkit/").unwrap();
        assert_eq!(store.endpoint().as_str(), "http://example.com/inboxkit/api/config");
    }

    #[test]
    fn test_timeout_from_settings() {
        let settings = SyncSettings::default().with_request_timeout(Duration::from_secs(3));
        let store = HttpRemoteStore::from_settings("http://localhost:3717", &settings).unwrap();
        assert_eq!(store.timeout(), Duration::from_secs(3));

        let store = HttpRemoteStore::new("http://localhost:3717").unwrap();
        assert_eq!(store.timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_invalid_url() {
        assert!(HttpRemoteStore::new("not a url").is_err());
    }

    #[test]
    fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let store =
            HttpRemoteStore::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = store.probe().unwrap_err();
        assert!(err.is_retryable());
    }
}
