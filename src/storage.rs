//! Upload-directory storage for ingested files.
//!
//! Owns the physical bytes behind [`crate::job::FileRecord`]s: saving an
//! upload under a stable, id-derived name and removing it again when the
//! record is deleted. Deletion is best-effort — a record whose bytes linger
//! on disk is harmless, so failures are logged rather than surfaced.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores uploaded files under a single directory, one file per
/// [`crate::job::FileId`].
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory uploads are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist uploaded bytes as `{file_id}{ext}` under the upload
    /// directory, creating it on first use. Returns the stored path.
    pub async fn save(
        &self,
        file_id: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let path = self.root.join(format!("{file_id}{ext}"));

        tokio::fs::write(&path, bytes).await?;
        debug!("Stored upload at {}", path.display());
        Ok(path)
    }

    /// Remove the stored bytes for a deleted record. Best-effort: failures
    /// are logged, never surfaced.
    pub async fn delete(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Deleted file: {}", path.display()),
            Err(e) => warn!("Failed to delete file {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_uses_id_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("uploads"));

        let path = storage.save("abc123", "invoice.PDF", b"%PDF-").await.unwrap();
        assert!(path.ends_with("abc123.PDF"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-");
    }

    #[tokio::test]
    async fn save_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        let path = storage.save("abc123", "scan", b"png").await.unwrap();
        assert!(path.ends_with("abc123"));
    }

    #[tokio::test]
    async fn delete_missing_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.delete(Path::new("/definitely/not/here.png")).await;
    }

    #[tokio::test]
    async fn delete_removes_stored_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        let path = storage.save("id1", "a.png", b"bytes").await.unwrap();
        storage.delete(&path).await;
        assert!(!path.exists());
    }
}
