//! Per-file ingestion pipeline
//!
//! Import into managed storage, probe dimensions, run vision analysis,
//! then generate a rename suggestion when the analysis is rich enough.
//! Probe and vision failures degrade the result instead of failing the
//! import; only filesystem and database errors propagate.

use crate::config::Settings;
use crate::db::activity::{log_activity, ActivityAction, NewActivity};
use crate::db::assets::{self, NewAsset};
use crate::db::folders::{self, WatchedFolder};
use crate::db::suggestions::{self, SuggestionStatus};
use crate::error::{Error, Result};
use crate::events::{EventBus, ShoeboxEvent};
use crate::services::confidence;
use crate::services::probe::MediaProbe;
use crate::services::scanner::{sniff_media_type, MediaKind};
use crate::services::template::{NameTemplate, TemplateContext};
use crate::services::vision::{VisionAnalysis, VisionAnalyzer};
use crate::storage::{hash_file, StorageLayout};
use serde_json::json;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Result of pushing one file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Imported {
        asset_id: Uuid,
        suggestion_id: Option<Uuid>,
    },
    /// The source path is already in the catalog; nothing to do.
    AlreadyImported,
    /// The file failed validation and was left untouched.
    Skipped(String),
}

pub struct FileProcessor {
    db: SqlitePool,
    layout: StorageLayout,
    event_bus: EventBus,
    vision: Arc<dyn VisionAnalyzer>,
    probe: MediaProbe,
    template: NameTemplate,
    default_project: String,
    confidence_threshold: f64,
}

impl FileProcessor {
    pub fn new(
        db: SqlitePool,
        settings: &Settings,
        event_bus: EventBus,
        vision: Arc<dyn VisionAnalyzer>,
    ) -> Result<Self> {
        Ok(Self {
            db,
            layout: StorageLayout::new(settings.storage_root.clone()),
            event_bus,
            vision,
            probe: MediaProbe::default(),
            template: NameTemplate::parse(&settings.rename_template)?,
            default_project: settings.default_project.clone(),
            confidence_threshold: settings.confidence_threshold,
        })
    }

    /// Process a single detected file for a watched folder.
    pub async fn process(&self, folder: &WatchedFolder, path: &Path) -> Result<ProcessOutcome> {
        let source_path = path.to_string_lossy().to_string();

        if assets::get_asset_by_source_path(&self.db, &source_path)
            .await?
            .is_some()
        {
            return Ok(ProcessOutcome::AlreadyImported);
        }

        let kind = match self.validate(path) {
            Ok(kind) => kind,
            Err(Error::Validation(reason)) => {
                tracing::debug!("skipping {}: {}", source_path, reason);
                return Ok(ProcessOutcome::Skipped(reason));
            }
            Err(e) => return Err(e),
        };

        let asset = self.import(folder, path, &source_path, kind).await?;
        self.event_bus.emit(ShoeboxEvent::FileImported {
            asset_id: asset.id,
            folder_id: folder.id,
            original_filename: asset.original_filename.clone(),
        });

        // enrichment reads the working copy; the watched file stays untouched
        let working = PathBuf::from(&asset.file_path);

        let info = match self.probe.probe(&working, kind).await {
            Ok(info) => {
                assets::update_media_info(&self.db, asset.id, info.width, info.height, info.duration_secs)
                    .await?;
                Some(info)
            }
            Err(e) => {
                tracing::warn!("probe failed for {}: {}", source_path, e);
                None
            }
        };

        let analysis = match self.vision.analyze(&working).await {
            Ok(analysis) => {
                assets::update_analysis(
                    &self.db,
                    asset.id,
                    analysis.description.as_deref(),
                    &analysis.tags,
                    &analysis.objects,
                    analysis.scene.as_deref(),
                )
                .await?;
                self.event_bus.emit(ShoeboxEvent::AssetAnalyzed {
                    asset_id: asset.id,
                    has_description: analysis.description.is_some(),
                    tag_count: analysis.tags.len(),
                });
                analysis
            }
            Err(e) => {
                tracing::warn!("vision analysis failed for {}: {}", source_path, e);
                VisionAnalysis::default()
            }
        };

        let suggestion_id = self
            .maybe_suggest(folder, &asset.id, &working, &analysis, &info)
            .await?;

        self.write_sidecar(&asset.id, folder, &source_path, &analysis)?;

        let mut tx = self.db.begin().await?;
        folders::record_processed(&mut *tx, folder.id, suggestion_id.is_some()).await?;
        log_activity(
            &mut *tx,
            ActivityAction::Import,
            NewActivity {
                asset_id: Some(asset.id),
                folder_id: Some(folder.id),
                new_value: Some(asset.stored_path.clone()),
                success: true,
                detail: Some(format!("imported from {}", source_path)),
                ..Default::default()
            },
        )
        .await?;
        tx.commit().await?;

        Ok(ProcessOutcome::Imported {
            asset_id: asset.id,
            suggestion_id,
        })
    }

    fn validate(&self, path: &Path) -> Result<MediaKind> {
        if !path.is_file() {
            return Err(Error::Validation(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        sniff_media_type(path)
    }

    async fn import(
        &self,
        folder: &WatchedFolder,
        path: &Path,
        source_path: &str,
        kind: MediaKind,
    ) -> Result<assets::Asset> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("no filename in {}", source_path)))?
            .to_string();
        let file_size = std::fs::metadata(path)?.len() as i64;

        let hash_path = path.to_path_buf();
        let content_hash = tokio::task::spawn_blocking(move || hash_file(&hash_path))
            .await
            .map_err(|e| Error::Internal(anyhow::anyhow!("hash task: {}", e)))?
            .ok();

        // both copies land under one bucket id before the row exists
        let asset_id = Uuid::new_v4();
        let stored = self
            .layout
            .import_original(path, &self.default_project, asset_id)?;
        let working = self
            .layout
            .import_working(path, &self.default_project, asset_id)?;

        let asset = assets::insert_asset(
            &self.db,
            &NewAsset {
                folder_id: Some(folder.id),
                project: self.default_project.clone(),
                original_filename: filename,
                source_path: source_path.to_string(),
                stored_path: stored.to_string_lossy().to_string(),
                file_path: working.to_string_lossy().to_string(),
                media_type: kind.as_str().to_string(),
                file_size,
                content_hash,
            },
        )
        .await?;
        Ok(asset)
    }

    async fn maybe_suggest(
        &self,
        folder: &WatchedFolder,
        asset_id: &Uuid,
        path: &Path,
        analysis: &VisionAnalysis,
        info: &Option<crate::services::probe::MediaInfo>,
    ) -> Result<Option<Uuid>> {
        let confidence = confidence::score(analysis);
        if confidence < self.confidence_threshold || analysis.description.is_none() {
            return Ok(None);
        }

        let original_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        let current_filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("untitled")
            .to_string();

        let ctx = TemplateContext {
            description: analysis.description.clone(),
            tags: analysis.tags.clone(),
            scene: analysis.scene.clone(),
            timestamp: None,
            index: 0,
            original: original_stem,
            width: info.as_ref().and_then(|i| i.width),
            height: info.as_ref().and_then(|i| i.height),
        };
        let stem = self.template.render(&ctx);
        if stem.is_empty() {
            return Ok(None);
        }

        let suggested = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
            None => stem,
        };
        if suggested == current_filename {
            return Ok(None);
        }

        let reasoning = analysis.description.clone();
        let suggestion = suggestions::create_suggestion(
            &self.db,
            *asset_id,
            Some(folder.id),
            &path.to_string_lossy(),
            &current_filename,
            &suggested,
            confidence,
            reasoning.as_deref(),
        )
        .await?;

        if folder.auto_approve {
            suggestions::resolve_pending(&self.db, suggestion.id, SuggestionStatus::Approved)
                .await?;
        }

        self.event_bus.emit(ShoeboxEvent::SuggestionCreated {
            suggestion_id: suggestion.id,
            asset_id: *asset_id,
            suggested_filename: suggested,
            confidence,
        });
        Ok(Some(suggestion.id))
    }

    fn write_sidecar(
        &self,
        asset_id: &Uuid,
        folder: &WatchedFolder,
        source_path: &str,
        analysis: &VisionAnalysis,
    ) -> Result<()> {
        let sidecar = json!({
            "asset_id": asset_id,
            "folder_id": folder.id,
            "source_path": source_path,
            "analysis": analysis,
        });
        if let Err(e) = self
            .layout
            .write_metadata(&self.default_project, *asset_id, &sidecar)
        {
            tracing::warn!("sidecar write failed for {}: {}", asset_id, e);
        }
        Ok(())
    }
}
