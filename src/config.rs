//! Configuration types for catalog binding.
//!
//! All pipeline behaviour is controlled through [`BinderConfig`], built via
//! its [`BinderConfigBuilder`]. One struct for every knob keeps the config
//! cheap to clone into concurrent guide tasks and easy to log.
//!
//! Settings usually arrive from a `config.json` next to the cookies
//! ([`FileConfig`]), then CLI flags override individual fields.

use crate::error::BinderError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one catalog run.
///
/// # Example
/// ```rust
/// use guide2pdf::BinderConfig;
///
/// let config = BinderConfig::builder()
///     .output_path("guides")
///     .max_in_progress(2)
///     .max_retries(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_in_progress, 2);
/// ```
#[derive(Clone)]
pub struct BinderConfig {
    /// Root directory for guide documents and their intermediate snapshots.
    pub output_path: PathBuf,

    /// Rebuild guide documents and snapshots that already exist. Default: false.
    pub overwrite: bool,

    /// Maximum number of guides assembled at the same time. Default: 3.
    ///
    /// Every in-flight guide holds one browser tab, so this is also the cap on
    /// simultaneous load against the remote site.
    pub max_in_progress: usize,

    /// Retry budget shared by every bounded operation. Default: 5. Must be ≥ 1.
    pub max_retries: u32,

    /// Snapshots smaller than this many bytes are re-rendered. Default: 10 KiB.
    pub min_bytes: u64,

    /// Keep the per-guide snapshot directory after merging. Default: false.
    pub keep_temp: bool,

    /// Absolute timeout for one navigation or reload. Default: 90.
    pub navigation_timeout_secs: u64,

    /// Pause before re-trying a failed navigation. Default: 10 000.
    pub navigation_cooldown_ms: u64,

    /// Pause before re-rendering an undersized snapshot. Default: 1 000.
    pub render_cooldown_ms: u64,

    /// Pause between injecting the stylesheet and the first render, giving
    /// the page time to paint. Default: 1 000.
    pub settle_ms: u64,

    /// Deadline for one whole guide. `None` lets a hung guide hold its slot
    /// forever. Default: 2 hours.
    pub guide_timeout_secs: Option<u64>,

    /// What to do with a snapshot that is still undersized after all retries.
    pub exhaustion_policy: ExhaustionPolicy,

    /// What to put in the merged document where a section failed.
    pub gap_policy: GapPolicy,

    /// CSS selectors describing the target site.
    pub selectors: SiteSelectors,

    /// Optional progress callback for per-guide and per-section events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output"),
            overwrite: false,
            max_in_progress: 3,
            max_retries: 5,
            min_bytes: 10 * 1024,
            keep_temp: false,
            navigation_timeout_secs: 90,
            navigation_cooldown_ms: 10_000,
            render_cooldown_ms: 1_000,
            settle_ms: 1_000,
            guide_timeout_secs: Some(2 * 60 * 60),
            exhaustion_policy: ExhaustionPolicy::default(),
            gap_policy: GapPolicy::default(),
            selectors: SiteSelectors::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderConfig")
            .field("output_path", &self.output_path)
            .field("overwrite", &self.overwrite)
            .field("max_in_progress", &self.max_in_progress)
            .field("max_retries", &self.max_retries)
            .field("min_bytes", &self.min_bytes)
            .field("keep_temp", &self.keep_temp)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("guide_timeout_secs", &self.guide_timeout_secs)
            .field("exhaustion_policy", &self.exhaustion_policy)
            .field("gap_policy", &self.gap_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BindProgressCallback>"),
            )
            .finish()
    }
}

impl BinderConfig {
    /// Create a new builder for `BinderConfig`.
    pub fn builder() -> BinderConfigBuilder {
        BinderConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn navigation_cooldown(&self) -> Duration {
        Duration::from_millis(self.navigation_cooldown_ms)
    }

    pub fn render_cooldown(&self) -> Duration {
        Duration::from_millis(self.render_cooldown_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn guide_timeout(&self) -> Option<Duration> {
        self.guide_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`BinderConfig`].
#[derive(Debug)]
pub struct BinderConfigBuilder {
    config: BinderConfig,
}

impl BinderConfigBuilder {
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn max_in_progress(mut self, n: usize) -> Self {
        self.config.max_in_progress = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn min_bytes(mut self, n: u64) -> Self {
        self.config.min_bytes = n;
        self
    }

    pub fn keep_temp(mut self, v: bool) -> Self {
        self.config.keep_temp = v;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn navigation_cooldown_ms(mut self, ms: u64) -> Self {
        self.config.navigation_cooldown_ms = ms;
        self
    }

    pub fn render_cooldown_ms(mut self, ms: u64) -> Self {
        self.config.render_cooldown_ms = ms;
        self
    }

    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.settle_ms = ms;
        self
    }

    pub fn guide_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.guide_timeout_secs = secs;
        self
    }

    pub fn exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.config.exhaustion_policy = policy;
        self
    }

    pub fn gap_policy(mut self, policy: GapPolicy) -> Self {
        self.config.gap_policy = policy;
        self
    }

    pub fn selectors(mut self, selectors: SiteSelectors) -> Self {
        self.config.selectors = selectors;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Overlay every field present in a [`FileConfig`].
    pub fn apply_file(mut self, file: &FileConfig) -> Self {
        if let Some(ref p) = file.output_path {
            self = self.output_path(p.clone());
        }
        if let Some(v) = file.overwrite {
            self = self.overwrite(v);
        }
        if let Some(n) = file.max_in_progress {
            self = self.max_in_progress(n);
        }
        if let Some(n) = file.max_retries {
            self = self.max_retries(n);
        }
        if let Some(n) = file.min_bytes {
            self = self.min_bytes(n);
        }
        if let Some(v) = file.keep_temp {
            self = self.keep_temp(v);
        }
        if let Some(secs) = file.navigation_timeout_secs {
            self = self.navigation_timeout_secs(secs);
        }
        if let Some(secs) = file.guide_timeout_secs {
            self = self.guide_timeout_secs(if secs == 0 { None } else { Some(secs) });
        }
        if let Some(p) = file.on_exhaustion {
            self = self.exhaustion_policy(p);
        }
        if let Some(g) = file.gaps {
            self = self.gap_policy(g);
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BinderConfig, BinderError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(BinderError::InvalidConfig(
                "maxRetries must be ≥ 1 (a navigation needs at least one attempt)".into(),
            ));
        }
        if c.max_in_progress == 0 {
            return Err(BinderError::InvalidConfig("maxInProgress must be ≥ 1".into()));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(BinderError::InvalidConfig("outputPath must not be empty".into()));
        }
        if c.selectors.fallback_candidates.is_empty() {
            return Err(BinderError::InvalidConfig(
                "at least one fallback content selector is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── On-disk config ───────────────────────────────────────────────────────

/// The `config.json` file format. Every field is optional.
///
/// ```json
/// { "outputPath": "guides", "overwrite": false, "maxInProgress": 3,
///   "maxRetries": 5, "minBytes": 10240, "keepTemp": false }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub output_path: Option<PathBuf>,
    pub overwrite: Option<bool>,
    #[serde(alias = "maxParallel")]
    pub max_in_progress: Option<usize>,
    pub max_retries: Option<u32>,
    pub min_bytes: Option<u64>,
    pub keep_temp: Option<bool>,
    pub navigation_timeout_secs: Option<u64>,
    /// `0` disables the guide deadline.
    pub guide_timeout_secs: Option<u64>,
    pub on_exhaustion: Option<ExhaustionPolicy>,
    pub gaps: Option<GapPolicy>,
}

// ── Policies ─────────────────────────────────────────────────────────────

/// Fate of a snapshot that is still below `min_bytes` after every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Keep the file and merge it anyway, with a warning. (default)
    #[default]
    Accept,
    /// Delete the file and treat the section as failed.
    Fail,
}

/// What the merged document shows where a section failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Nothing; the surrounding sections become adjacent. (default)
    #[default]
    Skip,
    /// A one-page "Section N unavailable" marker.
    Placeholder,
}

/// CSS selectors for the fixed structure of the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Catalog: one link per guide.
    pub catalog_link: String,
    /// Catalog: the guide title, the first following sibling of the link
    /// that matches.
    pub catalog_title: String,
    /// Guide landing page: ordered table-of-contents links.
    pub toc_link: String,
    /// Section page: the primary content element.
    pub content: String,
    /// Section page: containers measured when `content` is absent.
    pub fallback_candidates: Vec<String>,
    /// Section page: the header stacked above the content.
    pub header: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            catalog_link: "a.cover".into(),
            catalog_title: ".title".into(),
            toc_link: "#toc a[data-section-id]".into(),
            content: "#content article".into(),
            fallback_candidates: vec!["#content".into(), "body".into()],
            header: "header".into(),
        }
    }
}
