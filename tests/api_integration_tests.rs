//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use image::DynamicImage;
use image_tier_cache::{
    api::create_router,
    cache::{DiskCacheConfig, MemoryBudget, MemoryImageCache},
    error::{CacheError, Result},
    fetch::Fetcher,
    imaging::DecodedImage,
    loader::ui_channel,
    storage::FsStorage,
    tasks::{CacheSettings, SETTINGS_CHANNEL_CAPACITY},
    spawn_reconfigure_task, AppState, Loader,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

// == Helper Functions ==

const IMAGE_URL: &str = "http://images.test/cat.png";

struct CountingFetcher {
    png: Vec<u8>,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch_bytes(&self, key: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key == IMAGE_URL {
            Ok(Bytes::from(self.png.clone()))
        } else {
            Err(CacheError::Fetch {
                key: key.to_string(),
                reason: "404 Not Found".to_string(),
            })
        }
    }
}

struct TestApp {
    router: Router,
    loader: Loader,
    fetcher: Arc<CountingFetcher>,
    _tmp: TempDir,
}

fn create_test_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let png = DecodedImage::new(DynamicImage::new_rgba8(16, 9))
        .encode_png()
        .unwrap();
    let fetcher = Arc::new(CountingFetcher {
        png,
        calls: AtomicUsize::new(0),
    });

    let (ui, ui_loop) = ui_channel();
    tokio::spawn(ui_loop.run());

    let budget = MemoryBudget::Bytes { bytes: 1_000_000 };
    let loader = Loader::builder(fetcher.clone(), ui)
        .memory_cache(Arc::new(MemoryImageCache::from_budget(budget)))
        .build()
        .unwrap();

    let settings = CacheSettings::new(
        true,
        budget,
        false,
        DiskCacheConfig::default(),
        None,
        Arc::new(FsStorage::new(tmp.path(), None)),
    );
    let (tx, rx) = mpsc::channel(SETTINGS_CHANNEL_CAPACITY);
    spawn_reconfigure_task(loader.clone(), settings, rx);

    TestApp {
        router: create_router(AppState::new(loader.clone(), tx)),
        loader,
        fetcher,
        _tmp: tmp,
    }
}

async fn body_to_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_to_bytes(body).await).unwrap()
}

fn image_request(url: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/image?url={}", url))
        .body(Body::empty())
        .unwrap()
}

fn settings_request(json: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/settings")
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

// == IMAGE Endpoint Tests ==

#[tokio::test]
async fn test_image_endpoint_fetches_then_serves_from_memory() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(image_request(IMAGE_URL))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let body = body_to_bytes(response.into_body()).await;
    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 9));

    let response = app
        .router
        .clone()
        .oneshot(image_request(IMAGE_URL))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_image_endpoint_unknown_url_serves_placeholder() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(image_request("http://images.test/missing.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_bytes(response.into_body()).await;
    let decoded = image::load_from_memory(&body).unwrap();
    let placeholder = app.loader.placeholder();
    assert_eq!(
        (decoded.width(), decoded.height()),
        (placeholder.width(), placeholder.height())
    );
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    app.router
        .clone()
        .oneshot(image_request(IMAGE_URL))
        .await
        .unwrap();
    app.router
        .clone()
        .oneshot(image_request(IMAGE_URL))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["memory"]["hits"], 1);
    assert_eq!(json["memory"]["misses"], 1);
    assert_eq!(json["memory"]["total_entries"], 1);
    assert_eq!(json["memory"]["current_size"], 16 * 9 * 4);
    assert!(json["disk"].is_null());
}

// == SETTINGS Endpoint Tests ==

#[tokio::test]
async fn test_settings_endpoint_replaces_memory_cache() {
    let app = create_test_app();
    let before = app.loader.memory_cache().unwrap();

    let response = app
        .router
        .oneshot(settings_request(
            r#"{"memory_budget":{"mode":"percent","percent":25,"runtime_max_memory":4000}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["queued"], 1);

    // The change is applied by the background task
    let mut replaced = None;
    for _ in 0..50 {
        let current = app.loader.memory_cache().unwrap();
        if !Arc::ptr_eq(&before, &current) {
            replaced = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(replaced.unwrap().max_size(), 1000);
}

#[tokio::test]
async fn test_settings_endpoint_disables_memory_cache() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(settings_request(r#"{"memory_enabled":false}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for _ in 0..50 {
        if app.loader.memory_cache().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("memory cache was not disabled");
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_settings_rejected() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(settings_request(
            r#"{"memory_budget":{"mode":"percent","percent":0,"runtime_max_memory":4000}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("percent"));
}

#[tokio::test]
async fn test_empty_settings_rejected() {
    let app = create_test_app();

    let response = app.router.oneshot(settings_request("{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(settings_request("not json"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
