//! Staging directory for uploads and derived artifacts.
//!
//! Every artifact name starts with a millisecond timestamp followed by a
//! random token, so two requests landing in the same millisecond still get
//! distinct paths. Staged files are removed when their [`StagedFile`] guard
//! is dropped unless [`StagedFile::keep`] was called.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

const MAX_STEM_LEN: usize = 64;

/// Injected location where uploads are written and artifacts are served from.
#[derive(Debug, Clone)]
pub struct StagingDir {
    root: PathBuf,
    url_prefix: String,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Write an uploaded file under a fresh unique name.
    pub async fn stage(&self, filename: &str, data: &[u8]) -> io::Result<StagedFile> {
        let (stem, ext) = split_filename(filename);
        let staged = self.reserve(&stem, ext.as_deref());
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(staged.path(), data).await?;
        tracing::debug!(path = %staged.path().display(), bytes = data.len(), "Upload staged");
        Ok(staged)
    }

    /// Claim a unique path for an artifact that has not been written yet.
    ///
    /// The returned guard still deletes whatever ends up at that path on drop.
    pub fn reserve(&self, stem: &str, ext: Option<&str>) -> StagedFile {
        let name = match ext {
            Some(ext) => format!("{}_{}.{}", unique_token(), stem, ext),
            None => format!("{}_{}", unique_token(), stem),
        };
        StagedFile {
            path: self.root.join(name),
            keep: false,
        }
    }

    /// Public URL of a file inside the staging directory.
    pub fn url_for(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", self.url_prefix, name)
    }
}

/// A file inside the staging directory that is deleted on drop unless kept.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    keep: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm cleanup and hand back the path.
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }

    /// Remove the file through the async runtime instead of on drop.
    pub async fn discard(mut self) {
        self.keep = true;
        let path = std::mem::take(&mut self.path);
        log_removal(&path, tokio::fs::remove_file(&path).await);
    }
}

impl Drop for StagedFile {
    /// Synchronous fallback for error and cancellation paths that never
    /// reach [`StagedFile::discard`]; a single unlink in the staging dir.
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        log_removal(&self.path, std::fs::remove_file(&self.path));
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed staged file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file"),
    }
}

/// `<yyyymmddHHMMSSmmm>_<12 hex chars>`
fn unique_token() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S%3f"), &uuid[..12])
}

/// Reduce a client supplied filename to a safe stem and lowercase extension.
pub fn split_filename(filename: &str) -> (String, Option<String>) {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let stem: String = sanitize(stem).chars().take(MAX_STEM_LEN).collect();
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    let ext = ext
        .map(|e| sanitize(e).to_ascii_lowercase())
        .filter(|e| !e.is_empty());
    (stem, ext)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
