//! Streaming catalog API: emit guide reports as guides finish.
//!
//! A catalog run takes hours. [`bind_catalog_stream`] lets callers persist
//! or display each guide's report the moment it is ready instead of waiting
//! for the slowest guide.
//!
//! Reports arrive in completion order, which depends on each guide's size and
//! the remote site's latency. Only `config.max_in_progress` guides are polled
//! at once; the rest wait their turn.

use crate::bind::{bind_guide, discover_catalog, BindInputs};
use crate::config::BinderConfig;
use crate::error::BinderError;
use crate::output::GuideReport;
use crate::renderer::Browser;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// A boxed stream of guide reports.
///
/// An `Err` item is a fatal error of one guide wrapped in
/// [`BinderError::GuideAborted`]; the stream keeps going after it.
pub type GuideStream = Pin<Box<dyn Stream<Item = Result<GuideReport, BinderError>> + Send>>;

/// Discover the catalog, then stream one report per guide.
///
/// # Errors
/// Returns `Err` before any guide starts if the catalog cannot be read.
///
/// # Example
/// ```rust,no_run
/// use guide2pdf::{bind_catalog_stream, BindInputs, BinderConfig, Browser};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # async fn run(browser: Arc<dyn Browser>, inputs: BindInputs) -> Result<(), Box<dyn std::error::Error>> {
/// let config = BinderConfig::default();
/// let mut guides = bind_catalog_stream(browser, &inputs, &config).await?;
/// while let Some(guide) = guides.next().await {
///     match guide {
///         Ok(r) => println!("{}: {}", r.title, r.outcome.label()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn bind_catalog_stream(
    browser: Arc<dyn Browser>,
    inputs: &BindInputs,
    config: &BinderConfig,
) -> Result<GuideStream, BinderError> {
    let entries = discover_catalog(&*browser, inputs, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_catalog_start(entries.len());
    }

    let inputs = Arc::new(inputs.clone());
    let config = config.clone();
    let concurrency = config.max_in_progress;

    let s = stream::iter(entries.into_iter().map(move |entry| {
        let browser = Arc::clone(&browser);
        let inputs = Arc::clone(&inputs);
        let cfg = config.clone();
        async move {
            bind_guide(&*browser, &entry, &inputs, &cfg)
                .await
                .map_err(|e| BinderError::GuideAborted {
                    title: entry.title.clone(),
                    source: Box::new(e),
                })
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
