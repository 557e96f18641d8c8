//! Progress-callback trait for per-guide and per-section events.
//!
//! Inject an [`Arc<dyn BindProgressCallback>`] via
//! [`crate::config::BinderConfigBuilder::progress_callback`] to receive events
//! as the catalog is processed.
//!
//! Callbacks let the host decide how progress is shown (terminal bar, log
//! lines, a database row) without the library knowing about it. Guides run
//! concurrently, so implementations must be `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use guide2pdf::{BindProgressCallback, BinderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     sections: AtomicUsize,
//! }
//!
//! impl BindProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, guide: &str, index: usize, total: usize, bytes: u64) {
//!         self.sections.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{guide}: {index}/{total} ({bytes} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { sections: AtomicUsize::new(0) });
//!
//! let config = BinderConfig::builder()
//!     .progress_callback(counter as Arc<dyn BindProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::GuideOutcome;
use std::sync::Arc;

/// Called by the pipeline as it works through the catalog.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Guide-level and section-level events from different guides may arrive
/// concurrently. Events for one guide always arrive in order.
pub trait BindProgressCallback: Send + Sync {
    /// Called once after the catalog page has been read.
    fn on_catalog_start(&self, total_guides: usize) {
        let _ = total_guides;
    }

    /// Called when a guide's table of contents is known.
    fn on_guide_start(&self, guide: &str, total_sections: usize) {
        let _ = (guide, total_sections);
    }

    /// Called when a section snapshot is on disk (rendered or already present).
    fn on_section_complete(&self, guide: &str, index: usize, total: usize, bytes: u64) {
        let _ = (guide, index, total, bytes);
    }

    /// Called when a section is left out of the guide.
    fn on_section_error(&self, guide: &str, index: usize, total: usize, error: &str) {
        let _ = (guide, index, total, error);
    }

    /// Called once per guide with its final outcome.
    fn on_guide_complete(&self, guide: &str, outcome: &GuideOutcome) {
        let _ = (guide, outcome);
    }

    /// Called once after every guide has been attempted.
    fn on_catalog_complete(&self, total_guides: usize, built: usize) {
        let _ = (total_guides, built);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BindProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BinderConfig`].
pub type ProgressCallback = Arc<dyn BindProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        sections: AtomicUsize,
        errors: AtomicUsize,
        outcomes: Mutex<Vec<String>>,
    }

    impl BindProgressCallback for TrackingCallback {
        fn on_section_complete(&self, _guide: &str, _index: usize, _total: usize, _bytes: u64) {
            self.sections.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_error(&self, _guide: &str, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_guide_complete(&self, guide: &str, outcome: &GuideOutcome) {
            self.outcomes
                .lock()
                .unwrap()
                .push(format!("{guide}:{}", outcome.label()));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_catalog_start(2);
        cb.on_guide_start("Alpha", 3);
        cb.on_section_complete("Alpha", 1, 3, 42);
        cb.on_section_error("Alpha", 2, 3, "boom");
        cb.on_guide_complete("Alpha", &GuideOutcome::NoSections);
        cb.on_catalog_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_section_complete("Alpha", 1, 2, 100);
        tracker.on_section_error("Alpha", 2, 2, "navigation failed");
        tracker.on_guide_complete("Alpha", &GuideOutcome::NavigationFailed);

        assert_eq!(tracker.sections.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.outcomes.lock().unwrap().as_slice(),
            ["Alpha:navigation-failed"]
        );
    }
}
