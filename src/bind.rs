//! Eager (whole-catalog) entry points.
//!
//! [`bind_catalog`] waits for every guide, then returns one
//! [`CatalogReport`]. Use [`crate::stream::bind_catalog_stream`] instead to
//! observe guide reports as they finish.
//!
//! Both share the same building blocks defined here: [`discover_catalog`]
//! reads the guide list through a short-lived session, and [`bind_guide`]
//! runs one guide under its deadline.

use crate::config::BinderConfig;
use crate::error::BinderError;
use crate::output::{CatalogReport, GuideOutcome, GuideReport};
use crate::pipeline::discover::{self, CatalogEntry};
use crate::pipeline::guide;
use crate::pipeline::navigate::{navigate, NavigationPolicy};
use crate::renderer::{Browser, Cookie};
use crate::stream::bind_catalog_stream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The opaque inputs of a run, loaded once before the pipeline starts.
#[derive(Debug, Clone)]
pub struct BindInputs {
    /// The page listing every guide of the account.
    pub catalog_url: String,
    /// Shared read-only by every session.
    pub cookies: Vec<Cookie>,
    /// Injected into every section page before measuring.
    pub stylesheet: String,
}

/// Bind every guide in the catalog.
///
/// At most `config.max_in_progress` guides are assembled at once. A guide
/// that fails (even fatally) never cancels its siblings.
///
/// # Returns
/// `Ok(CatalogReport)` when every guide reached an outcome, even if some of
/// them were skipped or produced no document.
///
/// # Errors
/// - [`BinderError::CatalogUnavailable`] if the catalog page cannot be opened
/// - [`BinderError::GuideAborted`] wrapping the first fatal error of any
///   guide, reported after the remaining guides have finished
pub async fn bind_catalog(
    browser: Arc<dyn Browser>,
    inputs: &BindInputs,
    config: &BinderConfig,
) -> Result<CatalogReport, BinderError> {
    let start = Instant::now();
    let mut stream = bind_catalog_stream(browser, inputs, config).await?;

    let mut guides = Vec::new();
    let mut first_error: Option<BinderError> = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(report) => guides.push(report),
            Err(e) => {
                error!("{}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    let report = CatalogReport {
        catalog_url: inputs.catalog_url.clone(),
        guides,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Catalog done: {} built, {} skipped, {} without document, {}ms",
        report.built(),
        report.skipped(),
        report.failed(),
        report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_catalog_complete(report.guides.len(), report.built());
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// Open the catalog page and list its guides.
///
/// The session used for discovery is closed before returning.
pub async fn discover_catalog(
    browser: &dyn Browser,
    inputs: &BindInputs,
    config: &BinderConfig,
) -> Result<Vec<CatalogEntry>, BinderError> {
    info!("Reading catalog {}", inputs.catalog_url);
    let session = browser
        .open_session(&inputs.cookies)
        .await
        .map_err(BinderError::SessionFailed)?;

    let listed = async {
        navigate(
            &*session,
            &inputs.catalog_url,
            &NavigationPolicy::from_config(config),
        )
        .await
        .map_err(|failed| BinderError::CatalogUnavailable {
            url: failed.url,
            retries: failed.retries,
        })?;
        discover::catalog_entries(&*session, &config.selectors, &inputs.catalog_url).await
    }
    .await;

    if let Err(e) = session.close().await {
        warn!("Closing catalog session failed: {}", e);
    }
    let entries = listed?;
    info!("Catalog lists {} guides", entries.len());
    Ok(entries)
}

/// Assemble one guide, abandoning it once `config.guide_timeout()` elapses.
///
/// A timed-out guide keeps whatever snapshots it already wrote; the next
/// run reuses them. A merge already running when the deadline fires finishes
/// in the background but discards its output, so a `TimedOut` guide never
/// leaves `<title>.pdf` behind.
pub async fn bind_guide(
    browser: &dyn Browser,
    entry: &CatalogEntry,
    inputs: &BindInputs,
    config: &BinderConfig,
) -> Result<GuideReport, BinderError> {
    let start = Instant::now();
    let assembled = guide::assemble(browser, entry, &inputs.cookies, &inputs.stylesheet, config);

    let report = match config.guide_timeout() {
        None => assembled.await?,
        Some(limit) => match tokio::time::timeout(limit, assembled).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("{}: abandoned after {:?}", entry.title, limit);
                GuideReport {
                    title: entry.title.clone(),
                    url: entry.url.clone(),
                    outcome: GuideOutcome::TimedOut {
                        after_secs: limit.as_secs(),
                    },
                    sections: vec![],
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        },
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_guide_complete(&report.title, &report.outcome);
    }
    Ok(report)
}
