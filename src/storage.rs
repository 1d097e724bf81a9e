//! Managed storage layout
//!
//! Imported originals are copied under the storage root:
//!
//! ```text
//! <root>/originals/<year>/<project-slug>/<asset-id>/<filename>
//! <root>/working/<year>/<project-slug>/<asset-id>/<filename>   mutable copy, the rename target
//! <root>/metadata/<year>/<project-slug>/<asset-id>.json
//! ```

use crate::error::{Error, Result};
use chrono::{Datelike, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the top-level directory skeleton.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in ["originals", "working", "metadata"] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Destination for an imported original.
    pub fn original_path(&self, project: &str, asset_id: Uuid, filename: &str) -> PathBuf {
        self.bucket("originals", project, asset_id).join(filename)
    }

    /// Sidecar metadata file for an asset.
    pub fn metadata_path(&self, project: &str, asset_id: Uuid) -> PathBuf {
        let year = Utc::now().year().to_string();
        self.root
            .join("metadata")
            .join(year)
            .join(slugify(project))
            .join(format!("{}.json", asset_id))
    }

    fn bucket(&self, area: &str, project: &str, asset_id: Uuid) -> PathBuf {
        let year = Utc::now().year().to_string();
        self.root
            .join(area)
            .join(year)
            .join(slugify(project))
            .join(asset_id.to_string())
    }

    /// Copy a source file into the originals area, returning the stored
    /// path relative to the root. The source file is left in place.
    pub fn import_original(
        &self,
        source: &Path,
        project: &str,
        asset_id: Uuid,
    ) -> Result<PathBuf> {
        let dest = self.copy_into("originals", source, project, asset_id)?;
        let rel = dest
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or(dest);
        Ok(rel)
    }

    /// Copy a source file into the working area, returning the absolute
    /// path of the working copy. This copy is the one renames operate on.
    pub fn import_working(
        &self,
        source: &Path,
        project: &str,
        asset_id: Uuid,
    ) -> Result<PathBuf> {
        self.copy_into("working", source, project, asset_id)
    }

    fn copy_into(
        &self,
        area: &str,
        source: &Path,
        project: &str,
        asset_id: Uuid,
    ) -> Result<PathBuf> {
        let filename = source
            .file_name()
            .ok_or_else(|| Error::Validation(format!("no filename in {}", source.display())))?;
        let dest = self.bucket(area, project, asset_id).join(filename);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, &dest)?;
        Ok(dest)
    }

    /// Write a JSON metadata sidecar for an asset.
    pub fn write_metadata<T: Serialize>(
        &self,
        project: &str,
        asset_id: Uuid,
        metadata: &T,
    ) -> Result<PathBuf> {
        let path = self.metadata_path(project, asset_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| Error::Validation(format!("serialize metadata: {}", e)))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Lowercase, underscores for whitespace, strip everything outside
/// `[a-z0-9_-]`, collapse runs of underscores.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '-' {
            slug.push(c);
            last_underscore = false;
        } else if c.is_whitespace() || c == '_' {
            if !last_underscore && !slug.is_empty() {
                slug.push('_');
                last_underscore = true;
            }
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Summer Trip 2026"), "summer_trip_2026");
        assert_eq!(slugify("  A  B  "), "a_b");
        assert_eq!(slugify("weird!!chars##"), "weirdchars");
        assert_eq!(slugify("???"), "untitled");
    }

    #[test]
    fn original_path_is_bucketed() {
        let layout = StorageLayout::new("/data/sb");
        let id = Uuid::new_v4();
        let path = layout.original_path("My Project", id, "a.jpg");
        let s = path.to_string_lossy();
        assert!(s.starts_with("/data/sb/originals/"));
        assert!(s.contains("my_project"));
        assert!(s.contains(&id.to_string()));
        assert!(s.ends_with("a.jpg"));
    }

    #[test]
    fn import_copies_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("store"));
        layout.ensure_dirs().unwrap();

        let src = dir.path().join("photo.jpg");
        std::fs::write(&src, b"not really a jpeg").unwrap();

        let id = Uuid::new_v4();
        let rel = layout.import_original(&src, "trip", id).unwrap();
        assert!(layout.root().join(&rel).exists());
        assert!(src.exists());

        let working = layout.import_working(&src, "trip", id).unwrap();
        assert!(working.is_absolute());
        assert!(working.is_file());
        assert!(working.to_string_lossy().contains("/working/"));

        let hash = hash_file(&src).unwrap();
        assert_eq!(hash.len(), 64);
    }
}
