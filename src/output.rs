//! Result types reported by the pipeline.
//!
//! Everything here is `Serialize` so the CLI can print a machine-readable run
//! report with `--json`.

use crate::error::SectionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of converting one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    /// 1-based position in the table of contents.
    pub index: usize,
    pub url: String,
    /// Snapshot path. `None` exactly when `error` is set.
    pub path: Option<PathBuf>,
    /// Size of the snapshot on disk.
    pub bytes: u64,
    /// Number of renders performed (0 when an existing snapshot was reused).
    pub render_attempts: u32,
    /// Page size came from fallback heuristics.
    pub estimated: bool,
    /// The snapshot already existed and overwrite is off.
    pub reused: bool,
    /// Final snapshot is below `min_bytes` but was accepted.
    pub undersized: bool,
    pub error: Option<SectionError>,
}

impl SectionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.path.is_some()
    }
}

/// How one guide ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum GuideOutcome {
    /// The merged document already existed and overwrite is off.
    SkippedExisting { path: PathBuf },
    /// The landing page could not be opened within the retry budget.
    NavigationFailed,
    /// The landing page listed no sections.
    NoSections,
    /// Every section failed; no document was written.
    NothingMerged { failed: Vec<usize> },
    /// The guide document was written.
    Built {
        path: PathBuf,
        merged: usize,
        /// Indices left out of (or replaced by placeholders in) the document.
        failed: Vec<usize>,
    },
    /// The guide exceeded its deadline and was abandoned.
    TimedOut { after_secs: u64 },
}

impl GuideOutcome {
    /// Short machine-friendly name.
    pub fn label(&self) -> &'static str {
        match self {
            GuideOutcome::SkippedExisting { .. } => "skipped-existing",
            GuideOutcome::NavigationFailed => "navigation-failed",
            GuideOutcome::NoSections => "no-sections",
            GuideOutcome::NothingMerged { .. } => "nothing-merged",
            GuideOutcome::Built { .. } => "built",
            GuideOutcome::TimedOut { .. } => "timed-out",
        }
    }

    /// The guide document exists on disk after this outcome.
    pub fn has_document(&self) -> bool {
        matches!(
            self,
            GuideOutcome::Built { .. } | GuideOutcome::SkippedExisting { .. }
        )
    }
}

/// Result of assembling one guide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideReport {
    pub title: String,
    pub url: String,
    pub outcome: GuideOutcome,
    /// Per-section results in index order. Empty when no section was attempted.
    pub sections: Vec<SectionResult>,
    pub duration_ms: u64,
}

/// Result of a whole catalog run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogReport {
    pub catalog_url: String,
    /// Guide reports in completion order.
    pub guides: Vec<GuideReport>,
    pub duration_ms: u64,
}

impl CatalogReport {
    /// Guides whose document was written in this run.
    pub fn built(&self) -> usize {
        self.count(|o| matches!(o, GuideOutcome::Built { .. }))
    }

    /// Guides skipped because their document already existed.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, GuideOutcome::SkippedExisting { .. }))
    }

    /// Guides that ended without a document.
    pub fn failed(&self) -> usize {
        self.count(|o| !o.has_document())
    }

    fn count(&self, pred: impl Fn(&GuideOutcome) -> bool) -> usize {
        self.guides.iter().filter(|g| pred(&g.outcome)).count()
    }
}
