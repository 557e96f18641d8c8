//! Error types for the guide2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BinderError`] — **Fatal**: the run cannot make correct forward
//!   progress (catalog page unreachable, unreadable inputs, a merge or
//!   filesystem operation failed). Returned as `Err(BinderError)` from the
//!   top-level `bind_*` functions; the CLI maps it to exit code 1.
//!
//! * [`SectionError`] — **Non-fatal**: a single section could not be
//!   snapshotted (navigation retry budget spent, render stayed undersized
//!   under the fail policy). Stored inside [`crate::output::SectionResult`]
//!   so the guide continues with a gap instead of being lost entirely.
//!
//! Guide-level recoverable outcomes (landing page unreachable, empty table of
//! contents, deadline exceeded) are not errors at all: they are variants of
//! [`crate::output::GuideOutcome`].

use crate::renderer::RenderError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the guide2pdf library.
#[derive(Debug, Error)]
pub enum BinderError {
    // ── Catalog errors ────────────────────────────────────────────────────
    /// The catalog page could not be opened within the retry budget, so no
    /// guide can be discovered.
    #[error("Unable to open catalog '{url}' after {retries} retries\nCheck the cookies are still valid.")]
    CatalogUnavailable { url: String, retries: u32 },

    // ── Input errors ──────────────────────────────────────────────────────
    /// An input file (cookies, stylesheet, config) was not found.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on an input file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// An input file was read but its contents are unusable.
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    // ── Renderer errors ───────────────────────────────────────────────────
    /// The rendering engine could not open a new session (tab).
    #[error("Failed to open a browser session: {0}")]
    SessionFailed(#[source] RenderError),

    /// Writing a snapshot through the renderer failed.
    #[error("Rendering '{path}' failed: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    /// An in-page script failed or returned an unexpected shape.
    #[error("Page inspection failed on '{url}': {detail}")]
    Script { url: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Snapshots could not be combined into the guide document.
    #[error("Failed to merge '{path}': {detail}")]
    Merge { path: PathBuf, detail: String },

    /// A filesystem operation on the output tree failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Scheduling ────────────────────────────────────────────────────────
    /// A guide task hit a fatal error. Sibling guides were allowed to finish
    /// before this was reported.
    #[error("Guide '{title}' aborted the run: {source}")]
    GuideAborted {
        title: String,
        #[source]
        source: Box<BinderError>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BinderError {
    /// Shorthand for wrapping an `io::Error` with the path it concerns.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BinderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single section.
///
/// Stored alongside [`crate::output::SectionResult`] when a section fails.
/// The guide is still merged from the remaining sections.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// Navigation retry budget exhausted; no file was produced.
    #[error("Section {index}: navigation to {url} failed after {retries} retries")]
    NavigationFailed {
        index: usize,
        url: String,
        retries: u32,
    },

    /// Render stayed below the size threshold and the fail-on-exhaustion
    /// policy is active.
    #[error("Section {index}: snapshot stayed at {bytes} bytes (< {min_bytes}) after {attempts} renders")]
    Undersized {
        index: usize,
        bytes: u64,
        min_bytes: u64,
        attempts: u32,
    },
}

impl SectionError {
    /// 1-based index of the section this error belongs to.
    pub fn index(&self) -> usize {
        match self {
            SectionError::NavigationFailed { index, .. } | SectionError::Undersized { index, .. } => {
                *index
            }
        }
    }
}

/// The Navigator's failure value: the shared retry budget ran out.
///
/// This is a recoverable, per-target outcome; callers decide whether it is
/// fatal (catalog page) or merely skips one guide or section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("navigation to {url} failed after {retries} retries (last: {last})")]
pub struct NavigationFailed {
    pub url: String,
    pub retries: u32,
    /// Description of the last observed problem (status code or transport error).
    pub last: String,
}
