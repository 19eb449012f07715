//! prefsd - Inboxkit configuration endpoint
//!
//! Serves the shared configuration document to Inboxkit clients over HTTP,
//! persisting it to a single JSON file.

use std::sync::Arc;

use anyhow::Context;
use log::{error, info, warn};
use prefs::{DeploymentDefaults, FileConfigStore};

mod routes;

/// Environment variable holding the listen address
const LISTEN_ENV: &str = "INBOXKIT_LISTEN";
const DEFAULT_LISTEN: &str = "127.0.0.1:3717";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let defaults = match DeploymentDefaults::load() {
        Ok(defaults) => defaults,
        Err(e) => {
            warn!("Failed to read deployment settings, using environment: {:#}", e);
            DeploymentDefaults::from_env()
        }
    };

    let store = FileConfigStore::from_defaults(defaults)?;
    if store.is_enabled() {
        info!("Remote storage enabled at {}", store.path().display());
    } else {
        warn!(
            "Remote storage disabled; set INBOXKIT_REMOTE_STORAGE=true to persist configuration"
        );
    }

    let addr = std::env::var(LISTEN_ENV).unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, routes::router(Arc::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
