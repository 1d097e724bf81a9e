//! Configuration loading and root folder resolution
//!
//! Settings are resolved in priority order: command-line argument,
//! `SHOEBOX_*` environment variables, TOML config file, compiled defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime settings for the shoebox service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address for the HTTP API.
    pub host: String,
    pub port: u16,
    /// Root of the on-disk storage layout (originals/working/metadata).
    pub storage_root: PathBuf,
    /// Project segment used for assets imported from watched folders.
    pub default_project: String,
    /// Extensions accepted by the ingestion pipeline, lowercase, no dot.
    pub allowed_image_extensions: Vec<String>,
    pub allowed_video_extensions: Vec<String>,
    /// Naming template applied when generating rename suggestions.
    pub rename_template: String,
    /// Suggestions scoring below this are discarded.
    pub confidence_threshold: f64,
    /// Copy the source file aside before renaming it.
    pub create_backups: bool,
    /// Vision analysis endpoint (Ollama-compatible chat API).
    pub vision_host: String,
    pub vision_model: String,
    pub vision_timeout_secs: u64,
    /// Interval between progress snapshots pushed to SSE observers.
    pub progress_interval_secs: u64,
    /// Capacity of the ingestion queue.
    pub queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8002,
            storage_root: default_storage_root(),
            default_project: "general".to_string(),
            allowed_image_extensions: split_exts("jpg,jpeg,png,gif,webp,bmp,tiff"),
            allowed_video_extensions: split_exts("mp4,mov,avi,mkv,webm"),
            rename_template: "{description}_{date}".to_string(),
            confidence_threshold: 0.5,
            create_backups: true,
            vision_host: "http://127.0.0.1:11434".to_string(),
            vision_model: "llava".to_string(),
            vision_timeout_secs: 120,
            progress_interval_secs: 2,
            queue_capacity: 1024,
        }
    }
}

/// Raw TOML file shape; every field optional so partial configs work.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub storage_root: Option<PathBuf>,
    pub default_project: Option<String>,
    pub allowed_image_extensions: Option<String>,
    pub allowed_video_extensions: Option<String>,
    pub rename_template: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub create_backups: Option<bool>,
    pub vision_host: Option<String>,
    pub vision_model: Option<String>,
    pub vision_timeout_secs: Option<u64>,
    pub progress_interval_secs: Option<u64>,
}

impl Settings {
    /// Load settings with full resolution priority.
    ///
    /// `cli_root` overrides the storage root from any other source.
    pub fn load(cli_root: Option<&str>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(path) = config_file_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("read {}: {}", path.display(), e)))?;
                let file: TomlConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?;
                settings.apply_file(file);
            }
        }

        settings.apply_env();

        if let Some(root) = cli_root {
            settings.storage_root = PathBuf::from(root);
        }

        if settings.confidence_threshold < 0.0 || settings.confidence_threshold > 1.0 {
            return Err(Error::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                settings.confidence_threshold
            )));
        }

        Ok(settings)
    }

    /// Path of the SQLite database inside the storage root.
    pub fn database_path(&self) -> PathBuf {
        self.storage_root.join("shoebox.db")
    }

    /// Combined allowed extension set used by the watcher and importer.
    pub fn allowed_extensions(&self) -> Vec<String> {
        let mut exts = self.allowed_image_extensions.clone();
        exts.extend(self.allowed_video_extensions.iter().cloned());
        exts
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.allowed_image_extensions.iter().any(|e| e == ext)
    }

    pub fn is_video_extension(&self, ext: &str) -> bool {
        self.allowed_video_extensions.iter().any(|e| e == ext)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        if let Some(v) = file.host {
            self.host = v;
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.storage_root {
            self.storage_root = v;
        }
        if let Some(v) = file.default_project {
            self.default_project = v;
        }
        if let Some(v) = file.allowed_image_extensions {
            self.allowed_image_extensions = split_exts(&v);
        }
        if let Some(v) = file.allowed_video_extensions {
            self.allowed_video_extensions = split_exts(&v);
        }
        if let Some(v) = file.rename_template {
            self.rename_template = v;
        }
        if let Some(v) = file.confidence_threshold {
            self.confidence_threshold = v;
        }
        if let Some(v) = file.create_backups {
            self.create_backups = v;
        }
        if let Some(v) = file.vision_host {
            self.vision_host = v;
        }
        if let Some(v) = file.vision_model {
            self.vision_model = v;
        }
        if let Some(v) = file.vision_timeout_secs {
            self.vision_timeout_secs = v;
        }
        if let Some(v) = file.progress_interval_secs {
            self.progress_interval_secs = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SHOEBOX_ROOT") {
            self.storage_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SHOEBOX_PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("SHOEBOX_VISION_HOST") {
            self.vision_host = v;
        }
        if let Ok(v) = std::env::var("SHOEBOX_VISION_MODEL") {
            self.vision_model = v;
        }
    }
}

/// Ensure the storage root directory exists, creating it if missing.
pub fn ensure_storage_root(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)
        .map_err(|e| Error::Config(format!("create storage root {}: {}", root.display(), e)))
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("shoebox").join("config.toml"))
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("shoebox"))
        .unwrap_or_else(|| PathBuf::from("./shoebox_data"))
}

fn split_exts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
