/// Disk-backed upload storage
///
/// Files live at {root}/{project_id}/{version_id}/{filename}. Paths recorded in the
/// database are relative to the root so the upload directory can be moved.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A file written to disk, ready to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    /// Path relative to the upload root
    pub path: String,
    pub size_bytes: i64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload directory '{}': {}", self.root.display(), e))
    }

    /// Write a version file and compute its checksum
    pub async fn store(
        &self,
        project_id: &str,
        version_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let relative = Path::new(project_id).join(version_id).join(filename);
        let absolute = self.root.join(&relative);

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, bytes).await?;

        tracing::debug!("💾 Stored {} ({} bytes)", relative.display(), bytes.len());

        Ok(StoredFile {
            filename: filename.to_string(),
            path: relative.to_string_lossy().into_owned(),
            size_bytes: bytes.len() as i64,
            sha256: hex::encode(Sha256::digest(bytes)),
        })
    }

    /// Open a stored file for streaming
    pub async fn open(&self, relative_path: &str) -> Result<tokio::fs::File> {
        let file = tokio::fs::File::open(self.root.join(relative_path)).await?;
        Ok(file)
    }

    /// Remove every file of a version; a missing directory is not an error
    pub async fn remove_version(&self, project_id: &str, version_id: &str) -> Result<()> {
        remove_dir_if_exists(&self.root.join(project_id).join(version_id)).await
    }

    /// Remove every file of a project; a missing directory is not an error
    pub async fn remove_project(&self, project_id: &str) -> Result<()> {
        remove_dir_if_exists(&self.root.join(project_id)).await
    }
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to remove '{}': {}", dir.display(), e)),
    }
}

/// Reduce a client-supplied filename to a safe single path component
///
/// Keeps the last path segment, turns whitespace into underscores, drops anything
/// outside [A-Za-z0-9._-] and leading dots. Returns None when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = last
        .chars()
        .filter_map(|ch| match ch {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(128).collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
