//! Render-until-plausible size validation.
//!
//! The printer occasionally emits a blank or truncated PDF when it races the
//! page's own scripts. Those files are tiny, so a byte threshold catches
//! them, and re-running the identical render (no navigation) usually fixes
//! them.
//!
//! The file is always left on disk in its latest state; whether an
//! undersized result is acceptable is the caller's decision.

use crate::config::BinderConfig;
use crate::error::BinderError;
use crate::renderer::RenderError;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Knobs for one validated render.
#[derive(Debug, Clone, Copy)]
pub struct SizePolicy {
    pub min_bytes: u64,
    pub max_retries: u32,
    pub cooldown: Duration,
}

impl SizePolicy {
    pub fn from_config(config: &BinderConfig) -> Self {
        Self {
            min_bytes: config.min_bytes,
            max_retries: config.max_retries,
            cooldown: config.render_cooldown(),
        }
    }
}

/// What [`produce_validated`] observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// Total render invocations, including the first.
    pub attempts: u32,
    /// Size of the file after the last render.
    pub bytes: u64,
    /// The budget ran out with the file still below `min_bytes`.
    pub exhausted: bool,
}

/// Invoke `render` (which rewrites `path`) until the file reaches
/// `policy.min_bytes` or `policy.max_retries` re-renders have been spent.
///
/// # Errors
/// A failing render or an unreadable file is fatal. A file that does not
/// exist after rendering counts as zero bytes.
pub async fn produce_validated<F, Fut>(
    mut render: F,
    path: &Path,
    policy: &SizePolicy,
) -> Result<Validation, BinderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RenderError>>,
{
    let render_err = |source: RenderError| BinderError::Render {
        path: path.to_path_buf(),
        source,
    };

    render().await.map_err(render_err)?;
    let mut attempts = 1u32;
    let mut retries = 0u32;
    let mut bytes = file_size(path).await?;

    while bytes < policy.min_bytes && retries < policy.max_retries {
        warn!(
            "{}: {} bytes < {}, re-render {}/{}",
            path.display(),
            bytes,
            policy.min_bytes,
            retries + 1,
            policy.max_retries
        );
        sleep(policy.cooldown).await;
        render().await.map_err(render_err)?;
        retries += 1;
        attempts += 1;
        bytes = file_size(path).await?;
    }

    let exhausted = bytes < policy.min_bytes;
    debug!(
        "{}: {} bytes after {} renders (exhausted: {})",
        path.display(),
        bytes,
        attempts,
        exhausted
    );

    Ok(Validation {
        attempts,
        bytes,
        exhausted,
    })
}

/// Size of `path`, or 0 if the render left no file behind.
pub async fn file_size(path: &Path) -> Result<u64, BinderError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(BinderError::io(path, e)),
    }
}
