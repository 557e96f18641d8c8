//! Catalog and table-of-contents discovery.
//!
//! Both read the already-navigated page through an in-page script and turn
//! the raw JSON into typed, ordered values. Titles become path components,
//! so they are sanitised here and de-duplicated before any guide task starts.

use crate::config::SiteSelectors;
use crate::error::BinderError;
use crate::renderer::Session;
use crate::scripts;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

static RE_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9 ]+").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

/// One guide listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,
    /// Sanitised; safe to use as a file name.
    pub title: String,
}

/// One table-of-contents entry of a guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// 1-based position in the table of contents.
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// Strip everything but ASCII letters, digits and spaces, then collapse runs
/// of spaces.
///
/// ```
/// use guide2pdf::pipeline::discover::sanitize_title;
/// assert_eq!(sanitize_title("Beta!!Guide"), "BetaGuide");
/// assert_eq!(sanitize_title("Zelda: Breath of the Wild"), "Zelda Breath of the Wild");
/// ```
pub fn sanitize_title(raw: &str) -> String {
    let kept = RE_DISALLOWED.replace_all(raw, "");
    RE_SPACES.replace_all(&kept, " ").trim().to_string()
}

/// Sanitise titles and make every entry safe to process concurrently.
///
/// - repeated URLs are dropped (first occurrence wins);
/// - empty titles become `Guide <n>` (n = catalog position, 1-based);
/// - distinct guides whose titles collide get ` 2`, ` 3`, … suffixes.
pub fn normalize_entries(raw: Vec<(String, String)>) -> Vec<CatalogEntry> {
    let mut seen_urls = HashSet::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());

    for (position, (url, raw_title)) in raw.into_iter().enumerate() {
        if !seen_urls.insert(url.clone()) {
            debug!("Dropping duplicate catalog link {}", url);
            continue;
        }

        let mut title = sanitize_title(&raw_title);
        if title.is_empty() {
            title = format!("Guide {}", position + 1);
            warn!("{}: no usable title, using '{}'", url, title);
        }

        if taken.contains(&title) {
            // A generated name may itself be a real title listed elsewhere.
            let renamed = (2..)
                .map(|n| format!("{} {}", title, n))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_default();
            warn!("{}: title '{}' already taken, using '{}'", url, title, renamed);
            title = renamed;
        }
        taken.insert(title.clone());

        entries.push(CatalogEntry { url, title });
    }

    entries
}

/// Read the guide list from the catalog page open in `session`.
pub async fn catalog_entries(
    session: &dyn Session,
    selectors: &SiteSelectors,
    catalog_url: &str,
) -> Result<Vec<CatalogEntry>, BinderError> {
    let value = session
        .evaluate(&scripts::catalog_entries(selectors))
        .await
        .map_err(|e| script_error(catalog_url, e))?;
    let raw: Vec<RawEntry> = serde_json::from_value(value).map_err(|e| script_error(catalog_url, e))?;

    Ok(normalize_entries(
        raw.into_iter()
            .map(|r| (r.url, r.title.unwrap_or_default()))
            .collect(),
    ))
}

/// Read the ordered section list from the guide landing page open in
/// `session`. Indices start at 1 and follow document order.
pub async fn sections(
    session: &dyn Session,
    selectors: &SiteSelectors,
    guide_url: &str,
) -> Result<Vec<Section>, BinderError> {
    let value = session
        .evaluate(&scripts::toc_links(selectors))
        .await
        .map_err(|e| script_error(guide_url, e))?;
    let urls: Vec<String> = serde_json::from_value(value).map_err(|e| script_error(guide_url, e))?;

    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| Section { index: i + 1, url })
        .collect())
}

fn script_error(url: &str, e: impl std::fmt::Display) -> BinderError {
    BinderError::Script {
        url: url.to_string(),
        detail: e.to_string(),
    }
}
