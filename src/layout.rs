//! Deterministic output paths.
//!
//! ```text
//! <output>/<title>.pdf          merged guide document
//! <output>/<title>/<index>.pdf  intermediate section snapshots
//! ```
//!
//! Paths depend only on the sanitised title and the section index, which is
//! what makes re-runs idempotent: an existing path means finished work.

use crate::error::BinderError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Final merged document for a guide.
    pub fn guide_document(&self, title: &str) -> PathBuf {
        self.root.join(format!("{title}.pdf"))
    }

    /// Directory holding a guide's intermediate snapshots.
    pub fn snapshot_dir(&self, title: &str) -> PathBuf {
        self.root.join(title)
    }

    /// Snapshot for the 1-based section `index`.
    pub fn snapshot(&self, title: &str, index: usize) -> PathBuf {
        self.snapshot_dir(title).join(format!("{index}.pdf"))
    }
}

/// Whether `path` holds finished work. Errors other than "not found" are
/// returned rather than treated as absence.
pub async fn exists(path: &Path) -> Result<bool, BinderError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| BinderError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_layout() {
        let l = OutputLayout::new("/out");
        assert_eq!(l.guide_document("Alpha Guide"), PathBuf::from("/out/Alpha Guide.pdf"));
        assert_eq!(l.snapshot_dir("Alpha Guide"), PathBuf::from("/out/Alpha Guide"));
        assert_eq!(l.snapshot("Alpha Guide", 12), PathBuf::from("/out/Alpha Guide/12.pdf"));
    }

    #[test]
    fn document_sits_beside_snapshot_dir() {
        let l = OutputLayout::new("out");
        let doc = l.guide_document("BetaGuide");
        let dir = l.snapshot_dir("BetaGuide");
        assert_eq!(doc.parent(), dir.parent());
    }

    #[tokio::test]
    async fn exists_reports_unreadable_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        assert!(exists(&file).await.unwrap());
        assert!(!exists(&dir.path().join("missing.pdf")).await.unwrap());
        // A regular file where a directory is expected is an error, not absence.
        let err = exists(&file.join("Guide.pdf")).await.unwrap_err();
        assert!(matches!(err, BinderError::Io { .. }), "got: {err}");
    }
}
