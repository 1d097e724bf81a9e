//! HTTP API tests using the router directly

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shoebox::config::Settings;
use shoebox::db::assets::{self, NewAsset};
use shoebox::db::suggestions::{self, SuggestionStatus};
use shoebox::db::init_memory_pool;
use shoebox::error::Result;
use shoebox::events::EventBus;
use shoebox::pipeline::{FileProcessor, RenameExecutor};
use shoebox::services::vision::{VisionAnalysis, VisionAnalyzer};
use shoebox::watch::WatcherManager;
use shoebox::{build_router, AppState};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct StubVision;

#[async_trait]
impl VisionAnalyzer for StubVision {
    async fn analyze(&self, _path: &Path) -> Result<VisionAnalysis> {
        Ok(VisionAnalysis::default())
    }
}

async fn test_app(storage: &Path) -> (SqlitePool, Router) {
    let pool = init_memory_pool().await.unwrap();
    let settings = Settings {
        storage_root: storage.to_path_buf(),
        ..Settings::default()
    };
    let event_bus = EventBus::new(64);
    let processor = Arc::new(
        FileProcessor::new(pool.clone(), &settings, event_bus.clone(), Arc::new(StubVision))
            .unwrap(),
    );
    let watcher = Arc::new(WatcherManager::new(
        pool.clone(),
        event_bus.clone(),
        &settings,
        processor,
    ));
    watcher.start().await.unwrap();
    let executor = Arc::new(RenameExecutor::new(pool.clone(), event_bus.clone(), true));

    let state = AppState {
        db: pool.clone(),
        event_bus,
        settings: Arc::new(settings),
        watcher,
        executor,
        startup_time: Utc::now(),
    };
    (pool, build_router(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed_suggestion(pool: &SqlitePool) -> (Uuid, Uuid) {
    let asset = assets::insert_asset(
        pool,
        &NewAsset {
            folder_id: None,
            project: "general".to_string(),
            original_filename: "IMG_1.jpg".to_string(),
            source_path: "/inbox/IMG_1.jpg".to_string(),
            stored_path: "originals/x/IMG_1.jpg".to_string(),
            file_path: "/storage/working/x/IMG_1.jpg".to_string(),
            media_type: "image".to_string(),
            file_size: 10,
            content_hash: None,
        },
    )
    .await
    .unwrap();
    let suggestion = suggestions::create_suggestion(
        pool,
        asset.id,
        None,
        "/inbox/IMG_1.jpg",
        "IMG_1.jpg",
        "sunset.jpg",
        0.8,
        None,
    )
    .await
    .unwrap();
    (asset.id, suggestion.id)
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (_pool, app) = test_app(dir.path()).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn folder_crud_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("inbox");
    std::fs::create_dir_all(&watched).unwrap();
    let (_pool, app) = test_app(&dir.path().join("storage")).await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/folders")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "path": watched.to_string_lossy(), "name": "Inbox" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["folder"]["name"], "Inbox");
    let id = body["folder"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(Request::get("/api/folders").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["folders"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/folders/{}/pause", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["folder"]["status"], "paused");

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/folders/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_folder_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (_pool, app) = test_app(dir.path()).await;
    let response = app
        .oneshot(
            Request::get(format!("/api/folders/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn suggestion_review_flow_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, app) = test_app(dir.path()).await;
    let (_asset_id, suggestion_id) = seed_suggestion(&pool).await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/suggestions?status=pending")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::patch(format!("/api/suggestions/{}", suggestion_id))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "suggested_filename": "golden_hour.jpg" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["suggestion"]["suggested_filename"], "golden_hour.jpg");

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/suggestions/{}/approve", suggestion_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // second approve conflicts
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/suggestions/{}/approve", suggestion_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let fetched = suggestions::get_suggestion(&pool, suggestion_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.status, SuggestionStatus::Approved);
}

#[tokio::test]
async fn suggestion_list_filters_by_folder_and_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, app) = test_app(dir.path()).await;
    seed_suggestion(&pool).await;

    let folder_id = Uuid::new_v4();
    let asset = assets::insert_asset(
        &pool,
        &NewAsset {
            folder_id: None,
            project: "general".to_string(),
            original_filename: "IMG_2.jpg".to_string(),
            source_path: "/vacation/IMG_2.jpg".to_string(),
            stored_path: "originals/y/IMG_2.jpg".to_string(),
            file_path: "/storage/working/y/IMG_2.jpg".to_string(),
            media_type: "image".to_string(),
            file_size: 10,
            content_hash: None,
        },
    )
    .await
    .unwrap();
    suggestions::create_suggestion(
        &pool,
        asset.id,
        Some(folder_id),
        "/vacation/IMG_2.jpg",
        "IMG_2.jpg",
        "dunes.jpg",
        0.3,
        None,
    )
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/suggestions?folder_id={}", folder_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    let listed = body["suggestions"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["suggested_filename"], "dunes.jpg");

    let response = app
        .oneshot(
            Request::get("/api/suggestions?min_confidence=0.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    let listed = body["suggestions"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["suggested_filename"], "sunset.jpg");
}

#[tokio::test]
async fn amend_rejects_path_separators() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, app) = test_app(dir.path()).await;
    let (_asset_id, suggestion_id) = seed_suggestion(&pool).await;

    let response = app
        .oneshot(
            Request::patch(format!("/api/suggestions/{}", suggestion_id))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "suggested_filename": "../escape.jpg" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_endpoint_counts() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, app) = test_app(dir.path()).await;
    seed_suggestion(&pool).await;

    let response = app
        .oneshot(
            Request::get("/api/suggestions/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["stats"]["pending"], 1);
}
