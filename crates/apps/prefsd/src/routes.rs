//! HTTP routes of the configuration endpoint
//!
//! ```text
//! GET    /api/config   load (seeds from deployment defaults on first use)
//! POST   /api/config   validate and save
//! DELETE /api/config   remove the persisted document
//! GET    /health       liveness
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use log::{info, warn};
use prefs::remote::{DeleteResponse, LoadResponse, SaveResponse};
use prefs::{FileConfigStore, StoreError};
use serde_json::Value;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileConfigStore>,
}

/// Build the router over a file-backed store
pub fn router(store: Arc<FileConfigStore>) -> Router {
    Router::new()
        .route(
            "/api/config",
            get(load_config).post(save_config).delete(delete_config),
        )
        .route("/health", get(health))
        .with_state(AppState { store })
}

/// Run store work off the async executor
async fn blocking<T, F>(store: &Arc<FileConfigStore>, work: F) -> Result<T, StoreError>
where
    F: FnOnce(&FileConfigStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || work(&store))
        .await
        .map_err(|e| StoreError::Storage(anyhow::anyhow!("store task failed: {}", e)))?
}

fn store_error(err: StoreError) -> (StatusCode, String) {
    let status = match &err {
        StoreError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Configuration request failed: {}", err);
    }
    (status, err.to_string())
}

async fn load_config(State(state): State<AppState>) -> Response {
    let enabled = state.store.is_enabled();
    match blocking(&state.store, |store| store.load()).await {
        Ok(config) => Json(LoadResponse { enabled, config }).into_response(),
        Err(e) => {
            let (status, message) = store_error(e);
            (status, Json(serde_json::json!({ "error": message }))).into_response()
        }
    }
}

async fn save_config(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match blocking(&state.store, move |store| store.save_value(body)).await {
        Ok(saved) => {
            info!(
                "Saved configuration version {} ({} inboxes)",
                saved.version,
                saved.entities.len()
            );
            Json(SaveResponse::saved(saved)).into_response()
        }
        Err(e) => {
            let (status, message) = store_error(e);
            (status, Json(SaveResponse::failed(message))).into_response()
        }
    }
}

async fn delete_config(State(state): State<AppState>) -> Response {
    match blocking(&state.store, |store| store.delete()).await {
        Ok(_) => Json(DeleteResponse {
            success: true,
            error: None,
        })
        .into_response(),
        Err(e) => {
            let (status, message) = store_error(e);
            (
                status,
                Json(DeleteResponse {
                    success: false,
                    error: Some(message),
                }),
            )
                .into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
