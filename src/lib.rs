//! # guide2pdf
//!
//! Turn a catalog of paginated, login-gated online guides into one PDF
//! document per guide, through a headless browser.
//!
//! ## Why this crate?
//!
//! Browser "print to PDF" slices a long page into paper-sized pieces and
//! applies the site's print stylesheet, which for most guide sites hides the
//! content. This crate instead measures every section page, prints it as a
//! single page exactly as tall as its content (screen media, backgrounds on),
//! re-prints snapshots that come out suspiciously small, and concatenates the
//! sections of each guide in table-of-contents order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! catalog page
//!  │
//!  ├─ 1. Discover  list guides, sanitise titles          (one short-lived tab)
//!  ├─ 2. Schedule  ≤ max_in_progress guides at a time     (one tab per guide)
//!  │    └─ per guide, sequentially per section:
//!  │        navigate ─▶ inject stylesheet ─▶ measure ─▶ print ─▶ validate size
//!  ├─ 3. Merge     snapshots in index order → <output>/<title>.pdf
//!  └─ 4. Cleanup   remove <output>/<title>/ unless keep_temp
//! ```
//!
//! Every finished artefact lives at a deterministic path, so re-running after
//! a crash or a partial failure only redoes missing work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "chromium")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use guide2pdf::chromium::ChromiumBrowser;
//! use guide2pdf::{bind_catalog, input, BindInputs, BinderConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let inputs = BindInputs {
//!     catalog_url: "https://example.com/account/my_guides".into(),
//!     cookies: input::load_cookies(Path::new("cookies.json")).await?,
//!     stylesheet: input::load_stylesheet(Path::new("stylesheet.css")).await?,
//! };
//! let config = BinderConfig::builder().output_path("guides").build()?;
//!
//! let browser = Arc::new(ChromiumBrowser::launch_located(None, false).await?);
//! let report = bind_catalog(browser.clone(), &inputs, &config).await?;
//! eprintln!("{} built, {} skipped", report.built(), report.skipped());
//! browser.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature    | Default | Description |
//! |------------|---------|-------------|
//! | `cli`      | on      | Enables the `guide2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `chromium` | via cli | Chromium backend ([`chromium::ChromiumBrowser`]) over the DevTools protocol |
//!
//! Without `chromium`, supply your own [`Browser`] implementation:
//! ```toml
//! guide2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bind;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod config;
pub mod error;
pub mod input;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod scripts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bind::{bind_catalog, bind_guide, discover_catalog, BindInputs};
pub use config::{
    BinderConfig, BinderConfigBuilder, ExhaustionPolicy, FileConfig, GapPolicy, SiteSelectors,
};
pub use error::{BinderError, NavigationFailed, SectionError};
pub use layout::OutputLayout;
pub use output::{CatalogReport, GuideOutcome, GuideReport, SectionResult};
pub use pipeline::discover::{sanitize_title, CatalogEntry, Section};
pub use progress::{BindProgressCallback, NoopProgressCallback, ProgressCallback};
pub use renderer::{Browser, Cookie, NavResponse, PageSize, RenderError, Session, WaitUntil};
pub use stream::{bind_catalog_stream, GuideStream};
