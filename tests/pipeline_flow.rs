//! End-to-end pipeline flow: detect, import, analyze, suggest, approve,
//! rename, roll back.

use async_trait::async_trait;
use shoebox::config::Settings;
use shoebox::db::activity::{self, ActivityAction};
use shoebox::db::assets;
use shoebox::db::folders;
use shoebox::db::init_memory_pool;
use shoebox::db::suggestions::{self, SuggestionStatus};
use shoebox::error::Result;
use shoebox::events::EventBus;
use shoebox::pipeline::{FileProcessor, ProcessOutcome, RenameExecutor};
use shoebox::services::vision::{VisionAnalysis, VisionAnalyzer};
use std::path::Path;
use std::sync::Arc;

struct StubVision;

#[async_trait]
impl VisionAnalyzer for StubVision {
    async fn analyze(&self, _path: &Path) -> Result<VisionAnalysis> {
        Ok(VisionAnalysis {
            description: Some("A golden retriever chasing waves along the shore".to_string()),
            tags: vec!["dog".to_string(), "beach".to_string(), "waves".to_string()],
            objects: vec!["dog".to_string()],
            scene: Some("beach".to_string()),
        })
    }
}

fn png_bytes() -> Vec<u8> {
    vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0]
}

#[tokio::test]
async fn full_flow_from_file_to_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("inbox");
    let storage = dir.path().join("storage");
    std::fs::create_dir_all(&watched).unwrap();

    let pool = init_memory_pool().await.unwrap();
    let settings = Settings {
        storage_root: storage.clone(),
        ..Settings::default()
    };
    let event_bus = EventBus::new(64);
    let processor = FileProcessor::new(
        pool.clone(),
        &settings,
        event_bus.clone(),
        Arc::new(StubVision),
    )
    .unwrap();
    let executor = RenameExecutor::new(pool.clone(), event_bus.clone(), true);

    let folder = folders::insert_folder(&pool, &watched.to_string_lossy(), None, true, false)
        .await
        .unwrap();

    // a new file shows up in the watched folder
    let file = watched.join("IMG_0042.png");
    std::fs::write(&file, png_bytes()).unwrap();

    let outcome = processor.process(&folder, &file).await.unwrap();
    let (asset_id, suggestion_id) = match outcome {
        ProcessOutcome::Imported {
            asset_id,
            suggestion_id,
        } => (asset_id, suggestion_id.expect("suggestion")),
        other => panic!("unexpected outcome: {:?}", other),
    };

    // the original and a working copy landed in managed storage
    let asset = assets::get_asset(&pool, asset_id).await.unwrap().unwrap();
    assert!(storage.join(&asset.stored_path).is_file());
    let working = std::path::PathBuf::from(&asset.file_path);
    assert!(working.is_file());
    assert!(asset.description.is_some());

    // review and apply
    suggestions::resolve_pending(&pool, suggestion_id, SuggestionStatus::Approved)
        .await
        .unwrap();
    let applied = executor.execute(suggestion_id).await.unwrap();
    assert_eq!(applied.status, SuggestionStatus::Applied);
    // the watched file is untouched; the working copy got the new name
    assert!(file.is_file());
    assert!(!working.exists());
    let renamed = working.with_file_name(&applied.suggested_filename);
    assert!(renamed.is_file());

    let folder = folders::get_folder(&pool, folder.id).await.unwrap().unwrap();
    assert_eq!(folder.analyzed_count, 1);
    assert_eq!(folder.pending_count, 0);

    // change of heart: roll the rename back
    let renames = activity::list_activity(&pool, Some(asset_id), Some(ActivityAction::Rename), 10)
        .await
        .unwrap();
    executor.rollback(renames[0].id).await.unwrap();
    assert!(working.is_file());
    assert!(!renamed.exists());

    let asset = assets::get_asset(&pool, asset_id).await.unwrap().unwrap();
    assert_eq!(asset.current_filename, "IMG_0042.png");
}

#[tokio::test]
async fn regenerated_suggestion_supersedes_and_counts_stay_sane() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_memory_pool().await.unwrap();
    let settings = Settings {
        storage_root: dir.path().join("storage"),
        ..Settings::default()
    };
    let processor = FileProcessor::new(
        pool.clone(),
        &settings,
        EventBus::new(64),
        Arc::new(StubVision),
    )
    .unwrap();

    let folder = folders::insert_folder(&pool, "/inbox", None, true, false)
        .await
        .unwrap();
    let file = dir.path().join("IMG_0099.png");
    std::fs::write(&file, png_bytes()).unwrap();

    let outcome = processor.process(&folder, &file).await.unwrap();
    let asset_id = match outcome {
        ProcessOutcome::Imported { asset_id, .. } => asset_id,
        other => panic!("unexpected outcome: {:?}", other),
    };

    // a second suggestion for the same asset supersedes the first
    let replacement = suggestions::create_suggestion(
        &pool,
        asset_id,
        Some(folder.id),
        &file.to_string_lossy(),
        "IMG_0099.png",
        "better_name.png",
        0.95,
        None,
    )
    .await
    .unwrap();

    let pending = suggestions::list_suggestions(
        &pool,
        &suggestions::SuggestionFilter {
            status: Some(SuggestionStatus::Pending),
            asset_id: Some(asset_id),
            ..Default::default()
        },
        10,
    )
    .await
    .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, replacement.id);

    let stats = suggestions::suggestion_stats(&pool).await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.superseded, 1);
}
