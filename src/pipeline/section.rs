//! One section page → one size-validated snapshot on disk.
//!
//! ## Steps
//!
//! 1. Reuse the snapshot if it already exists and overwrite is off.
//! 2. Navigate (shared retry budget). Exhaustion is a per-section failure,
//!    never fatal: the guide continues with a gap.
//! 3. Inject the stylesheet, then measure the page.
//! 4. Let the page settle, then render until the file is plausibly large.
//! 5. Apply the exhaustion policy to a file that stayed undersized.
//!
//! Renderer failures *after* a successful navigation (a script or print
//! error) are fatal: they mean the browser itself is misbehaving.

use crate::config::{BinderConfig, ExhaustionPolicy};
use crate::error::{BinderError, SectionError};
use crate::layout::{exists, OutputLayout};
use crate::output::SectionResult;
use crate::pipeline::dimensions;
use crate::pipeline::discover::Section;
use crate::pipeline::navigate::{navigate, NavigationPolicy};
use crate::pipeline::validate::{file_size, produce_validated, SizePolicy};
use crate::renderer::Session;
use std::io::ErrorKind;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Snapshot `section` of guide `title` through `session`.
///
/// The returned result carries a [`SectionError`] for recoverable failures;
/// `Err` is reserved for fatal ones.
pub async fn convert_section(
    session: &dyn Session,
    section: &Section,
    title: &str,
    stylesheet: &str,
    config: &BinderConfig,
    layout: &OutputLayout,
) -> Result<SectionResult, BinderError> {
    let path = layout.snapshot(title, section.index);
    let mut result = SectionResult {
        index: section.index,
        url: section.url.clone(),
        path: None,
        bytes: 0,
        render_attempts: 0,
        estimated: false,
        reused: false,
        undersized: false,
        error: None,
    };

    // ── Step 1: Reuse finished work ──────────────────────────────────────
    if !config.overwrite && exists(&path).await? {
        result.bytes = file_size(&path).await?;
        result.reused = true;
        result.path = Some(path);
        debug!("{} #{}: snapshot exists, reusing", title, section.index);
        return Ok(result);
    }

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| BinderError::io(dir, e))?;
    }

    // ── Step 2: Navigate ─────────────────────────────────────────────────
    if let Err(failed) = navigate(session, &section.url, &NavigationPolicy::from_config(config)).await {
        warn!("{} #{}: {}", title, section.index, failed);
        result.error = Some(SectionError::NavigationFailed {
            index: section.index,
            url: section.url.clone(),
            retries: failed.retries,
        });
        return Ok(result);
    }

    // ── Step 3: Style and measure ────────────────────────────────────────
    session
        .inject_style(stylesheet)
        .await
        .map_err(|e| BinderError::Script {
            url: section.url.clone(),
            detail: e.to_string(),
        })?;

    let dims = dimensions::estimate(session, &config.selectors)
        .await
        .map_err(|e| BinderError::Script {
            url: section.url.clone(),
            detail: e.to_string(),
        })?;
    if dims.estimated {
        warn!(
            "{} #{}: layout not as expected, estimated page size {}x{}",
            title, section.index, dims.width, dims.height
        );
    }
    result.estimated = dims.estimated;

    // ── Step 4: Render and validate ──────────────────────────────────────
    sleep(config.settle()).await;
    let size = dims.page_size();
    let validation = produce_validated(
        || session.render_to_file(&path, size),
        &path,
        &SizePolicy::from_config(config),
    )
    .await?;
    result.render_attempts = validation.attempts;
    result.bytes = validation.bytes;

    // ── Step 5: Exhaustion policy ────────────────────────────────────────
    // Nothing on disk can't be merged, whatever the policy says.
    let keep_undersized = config.exhaustion_policy == ExhaustionPolicy::Accept && validation.bytes > 0;
    if validation.exhausted && keep_undersized {
        warn!(
            "{} #{}: keeping undersized snapshot ({} bytes < {})",
            title, section.index, validation.bytes, config.min_bytes
        );
        result.undersized = true;
    } else if validation.exhausted {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BinderError::io(&path, e)),
        }
        warn!(
            "{} #{}: dropping undersized snapshot ({} bytes < {})",
            title, section.index, validation.bytes, config.min_bytes
        );
        result.error = Some(SectionError::Undersized {
            index: section.index,
            bytes: validation.bytes,
            min_bytes: config.min_bytes,
            attempts: validation.attempts,
        });
        return Ok(result);
    }

    info!(
        "{} #{}: {} bytes in {} render(s)",
        title, section.index, validation.bytes, validation.attempts
    );
    result.path = Some(path);
    Ok(result)
}
