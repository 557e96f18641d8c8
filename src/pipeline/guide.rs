//! One guide: landing page → ordered sections → merged document.
//!
//! ```text
//! CheckExisting ─▶ Navigate ─▶ EnumerateSections ─▶ ConvertEach ─▶ Merge ─▶ Cleanup
//!      │              │                │
//!      └─ skip        └─ nav failed    └─ no sections
//! ```
//!
//! Sections are converted strictly in order through a single session: the
//! tab keeps the guide's navigation state, and the merge needs index order
//! anyway. Guide-level problems end in a [`GuideOutcome`]; only merge and
//! filesystem failures (and a misbehaving browser) are returned as `Err`.

use crate::config::{BinderConfig, GapPolicy};
use crate::error::BinderError;
use crate::layout::{exists, OutputLayout};
use crate::output::{GuideOutcome, GuideReport, SectionResult};
use crate::pipeline::discover::{self, CatalogEntry};
use crate::pipeline::merge::{merge, MergePart};
use crate::pipeline::navigate::{navigate, NavigationPolicy};
use crate::pipeline::section::convert_section;
use crate::renderer::{Browser, Cookie, Session};
use std::io::ErrorKind;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Assemble the guide described by `entry` into `<output>/<title>.pdf`.
pub async fn assemble(
    browser: &dyn Browser,
    entry: &CatalogEntry,
    cookies: &[Cookie],
    stylesheet: &str,
    config: &BinderConfig,
) -> Result<GuideReport, BinderError> {
    let start = Instant::now();
    let layout = OutputLayout::new(&config.output_path);
    let document = layout.guide_document(&entry.title);

    let report = |outcome: GuideOutcome, sections: Vec<SectionResult>| GuideReport {
        title: entry.title.clone(),
        url: entry.url.clone(),
        outcome,
        sections,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    // ── CheckExisting ────────────────────────────────────────────────────
    if !config.overwrite && exists(&document).await? {
        info!("{}: {} exists, skipping", entry.title, document.display());
        return Ok(report(GuideOutcome::SkippedExisting { path: document }, vec![]));
    }

    let session = browser
        .open_session(cookies)
        .await
        .map_err(BinderError::SessionFailed)?;
    let worked = work(&*session, entry, stylesheet, config, &layout).await;
    if let Err(e) = session.close().await {
        warn!("{}: closing session failed: {}", entry.title, e);
    }
    let (outcome, sections) = worked?;

    // ── Cleanup ──────────────────────────────────────────────────────────
    if !config.keep_temp && matches!(outcome, GuideOutcome::Built { .. } | GuideOutcome::NothingMerged { .. }) {
        remove_snapshots(&layout, &entry.title).await?;
    }

    Ok(report(outcome, sections))
}

/// Everything between opening and closing the guide's session.
async fn work(
    session: &dyn Session,
    entry: &CatalogEntry,
    stylesheet: &str,
    config: &BinderConfig,
    layout: &OutputLayout,
) -> Result<(GuideOutcome, Vec<SectionResult>), BinderError> {
    // ── Navigate ─────────────────────────────────────────────────────────
    if let Err(failed) = navigate(session, &entry.url, &NavigationPolicy::from_config(config)).await {
        warn!("{}: skipping guide, {}", entry.title, failed);
        return Ok((GuideOutcome::NavigationFailed, vec![]));
    }

    // ── EnumerateSections ────────────────────────────────────────────────
    let sections = discover::sections(session, &config.selectors, &entry.url).await?;
    if sections.is_empty() {
        warn!("{}: no sections found at {}", entry.title, entry.url);
        return Ok((GuideOutcome::NoSections, vec![]));
    }
    let total = sections.len();
    info!("{}: {} sections", entry.title, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_guide_start(&entry.title, total);
    }

    // ── ConvertEach ──────────────────────────────────────────────────────
    let mut results = Vec::with_capacity(total);
    for section in &sections {
        let result = convert_section(session, section, &entry.title, stylesheet, config, layout).await?;
        if let Some(ref cb) = config.progress_callback {
            match result.error {
                None => cb.on_section_complete(&entry.title, result.index, total, result.bytes),
                Some(ref e) => cb.on_section_error(&entry.title, result.index, total, &e.to_string()),
            }
        }
        results.push(result);
    }

    // ── Merge ────────────────────────────────────────────────────────────
    let failed: Vec<usize> = results.iter().filter(|r| !r.is_ok()).map(|r| r.index).collect();
    let parts = merge_plan(&results, config.gap_policy);
    let merged = results.len() - failed.len();

    if merged == 0 {
        warn!("{}: every section failed, no document written", entry.title);
        return Ok((GuideOutcome::NothingMerged { failed }, results));
    }
    if !failed.is_empty() {
        warn!("{}: sections {:?} missing from the document", entry.title, failed);
    }

    let document = layout.guide_document(&entry.title);
    let pages = merge(parts, &document).await?;
    info!(
        "{}: wrote {} ({} sections, {} pages)",
        entry.title,
        document.display(),
        merged,
        pages
    );

    Ok((
        GuideOutcome::Built {
            path: document,
            merged,
            failed,
        },
        results,
    ))
}

/// Successful snapshots in index order, with failures handled per `gaps`.
pub fn merge_plan(results: &[SectionResult], gaps: GapPolicy) -> Vec<MergePart> {
    let mut ordered: Vec<&SectionResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.index);
    ordered
        .into_iter()
        .filter_map(|r| match (&r.path, &r.error, gaps) {
            (Some(path), None, _) => Some(MergePart::Snapshot(path.clone())),
            (_, _, GapPolicy::Placeholder) => Some(MergePart::Placeholder { index: r.index }),
            (_, _, GapPolicy::Skip) => None,
        })
        .collect()
}

async fn remove_snapshots(layout: &OutputLayout, title: &str) -> Result<(), BinderError> {
    let dir = layout.snapshot_dir(title);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => {
            debug!("Removed {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BinderError::io(dir, e)),
    }
}
