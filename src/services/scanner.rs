//! Filesystem enumeration for watched folders

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Enumerates media files under a folder.
#[derive(Debug, Clone)]
pub struct FolderScanner {
    allowed_extensions: Vec<String>,
}

impl FolderScanner {
    pub fn new(allowed_extensions: Vec<String>) -> Self {
        Self { allowed_extensions }
    }

    /// Walk `root` and collect candidate files in discovery order. Hidden
    /// files and directories are skipped wholesale.
    pub fn scan(&self, root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::Validation(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("scan skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_candidate(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Extension check shared by the scanner and the live watcher.
    pub fn is_candidate(&self, path: &Path) -> bool {
        if is_hidden(path) {
            return false;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.allowed_extensions.iter().any(|a| *a == ext)
            }
            None => false,
        }
    }
}

/// Verify file content matches a known image or video signature. Wrong or
/// unknown magic bytes fail validation even when the extension looks right.
pub fn sniff_media_type(path: &Path) -> Result<MediaKind> {
    let kind = infer::get_from_path(path)?;
    match kind {
        Some(k) if k.matcher_type() == infer::MatcherType::Image => Ok(MediaKind::Image),
        Some(k) if k.matcher_type() == infer::MatcherType::Video => Ok(MediaKind::Video),
        Some(k) => Err(Error::Validation(format!(
            "{}: unsupported content type {}",
            path.display(),
            k.mime_type()
        ))),
        None => Err(Error::Validation(format!(
            "{}: unrecognized file content",
            path.display()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
