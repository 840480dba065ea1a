//! Filesystem blob store
//!
//! Content lives under `<root>/<category>/<uuid><ext>`; the relative path is
//! the opaque file id handed back to callers. Ids are validated before every
//! lookup so a stored id can never escape the blob root.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Content-addressable storage for uploaded documents and export artifacts
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open or create a blob store rooted at the given directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Opened blob store");
        Ok(Self { root })
    }

    /// Store bytes and return the opaque file id. The original filename only
    /// contributes its extension.
    pub fn put(&self, data: &[u8], filename: &str, category: &str) -> Result<String> {
        let suffix = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let file_id = format!("{}/{}{}", category, Uuid::now_v7().simple(), suffix);
        let target = self.checked_path(&file_id)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
        debug!(%file_id, bytes = data.len(), "Stored blob");
        Ok(file_id)
    }

    /// Read a blob back by id
    pub fn get(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.path(file_id)?;
        Ok(fs::read(path)?)
    }

    /// Resolve a file id to its on-disk path, failing if it does not exist
    pub fn path(&self, file_id: &str) -> Result<PathBuf> {
        let path = self.checked_path(file_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(format!("blob {}", file_id)));
        }
        Ok(path)
    }

    /// Best-effort removal of a set of blobs
    pub fn delete(&self, file_ids: &[String]) {
        for file_id in file_ids {
            if let Ok(path) = self.checked_path(file_id)
                && path.exists()
                && let Err(e) = fs::remove_file(&path)
            {
                debug!(%file_id, error = %e, "Failed to delete blob");
            }
        }
    }

    fn checked_path(&self, file_id: &str) -> Result<PathBuf> {
        let relative = Path::new(file_id);
        let valid = !file_id.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidId(format!("file id '{}'", file_id)));
        }
        Ok(self.root.join(relative))
    }
}
