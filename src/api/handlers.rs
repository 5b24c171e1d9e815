//! API Handlers
//!
//! HTTP request handlers for each image cache endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::imaging::DecodedImage;
use crate::loader::{DisplaySurface, Loader, Slot};
use crate::models::{
    HealthResponse, ImageQuery, SettingsRequest, SettingsResponse, StatsResponse,
};
use crate::tasks::SettingsChange;

/// How long a finished load may take to reach the UI loop.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Image loader with the current cache tiers
    pub loader: Loader,
    /// Queue into the reconfiguration task
    pub settings: mpsc::Sender<SettingsChange>,
}

impl AppState {
    pub fn new(loader: Loader, settings: mpsc::Sender<SettingsChange>) -> Self {
        Self { loader, settings }
    }
}

/// Surface backing one HTTP request: the first image shown completes it.
struct ResponseSurface {
    tx: Mutex<Option<oneshot::Sender<DecodedImage>>>,
}

impl DisplaySurface for ResponseSurface {
    fn show_image(&self, image: DecodedImage) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(image);
        }
    }
}

/// Handler for GET /image?url=
///
/// Resolves the image through the loader and returns it as PNG. Failed
/// fetches answer with the placeholder, the same as a display slot would.
pub async fn image_handler(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response> {
    let (tx, rx) = oneshot::channel();
    let surface = Arc::new(ResponseSurface {
        tx: Mutex::new(Some(tx)),
    });
    let slot = Slot::new(&surface);

    if let Some(task) = state.loader.load(&slot, &query.url) {
        task.await
            .map_err(|err| CacheError::Internal(format!("load task failed: {}", err)))?;
    }

    let image = tokio::time::timeout(DELIVERY_TIMEOUT, rx)
        .await
        .map_err(|_| CacheError::Internal("image was not delivered".to_string()))?
        .map_err(|_| CacheError::Internal("image delivery dropped".to_string()))?;
    drop(surface);

    debug!(key = %query.url, width = image.width(), height = image.height(), "serving image");
    let png = tokio::task::spawn_blocking(move || image.encode_png())
        .await
        .map_err(|err| CacheError::Internal(format!("encode task failed: {}", err)))??;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Handler for PUT /settings
///
/// Validates the request and queues one change per field present. The
/// reconfiguration task applies them in order.
pub async fn settings_handler(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> Result<(StatusCode, Json<SettingsResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let changes = req.into_changes();
    if changes.is_empty() {
        return Err(CacheError::InvalidRequest(
            "No settings provided".to_string(),
        ));
    }

    let queued = changes.len();
    for change in changes {
        state
            .settings
            .send(change)
            .await
            .map_err(|_| CacheError::Internal("reconfiguration task stopped".to_string()))?;
    }

    Ok((StatusCode::ACCEPTED, Json(SettingsResponse::new(queued))))
}

/// Handler for GET /stats
///
/// Returns statistics for the tiers currently in use.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let memory = state.loader.memory_cache().map(|m| m.stats().into());
    let disk = state.loader.disk_cache().map(|d| d.stats().into());

    Json(StatsResponse { memory, disk })
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryBudget, MemoryImageCache};
    use crate::fetch::Fetcher;
    use crate::loader::ui_channel;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct NoNetwork;

    #[async_trait]
    impl Fetcher for NoNetwork {
        async fn fetch_bytes(&self, key: &str) -> Result<Bytes> {
            Err(CacheError::Fetch {
                key: key.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn create_state() -> (AppState, mpsc::Receiver<SettingsChange>) {
        let (ui, ui_loop) = ui_channel();
        tokio::spawn(ui_loop.run());
        let loader = Loader::builder(Arc::new(NoNetwork), ui)
            .memory_cache(Arc::new(MemoryImageCache::with_byte_budget(100_000)))
            .build()
            .unwrap();
        let (tx, rx) = mpsc::channel(8);
        (AppState::new(loader, tx), rx)
    }

    #[tokio::test]
    async fn test_image_handler_memory_hit() {
        let (state, _rx) = create_state();
        let cached = DecodedImage::new(image::DynamicImage::new_rgba8(3, 2));
        state
            .loader
            .memory_cache()
            .unwrap()
            .add("http://img/a.png", cached)
            .unwrap();

        let query = ImageQuery {
            url: "http://img/a.png".to_string(),
        };
        let response = image_handler(State(state), Query(query)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_image_handler_failed_fetch_serves_placeholder() {
        let (state, _rx) = create_state();

        let query = ImageQuery {
            url: "http://img/missing.png".to_string(),
        };
        let response = image_handler(State(state.clone()), Query(query))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!state
            .loader
            .memory_cache()
            .unwrap()
            .contains("http://img/missing.png"));
    }

    #[tokio::test]
    async fn test_settings_handler_queues_changes() {
        let (state, mut rx) = create_state();

        let req = SettingsRequest {
            memory_budget: Some(MemoryBudget::Bytes { bytes: 10 }),
            disk_enabled: Some(false),
            ..SettingsRequest::default()
        };
        let (status, response) = settings_handler(State(state), Json(req)).await.unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.queued, 2);
        assert_eq!(
            rx.recv().await,
            Some(SettingsChange::MemoryBudget(MemoryBudget::Bytes { bytes: 10 }))
        );
        assert_eq!(rx.recv().await, Some(SettingsChange::DiskEnabled(false)));
    }

    #[tokio::test]
    async fn test_settings_handler_rejects_empty_request() {
        let (state, _rx) = create_state();

        let result = settings_handler(State(state), Json(SettingsRequest::default())).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _rx) = create_state();

        let response = stats_handler(State(state)).await;
        let memory = response.memory.clone().unwrap();
        assert_eq!(memory.hits, 0);
        assert_eq!(memory.max_size, 100_000);
        assert!(response.disk.is_none());
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
