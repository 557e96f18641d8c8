//! Snapshot page size from live layout.
//!
//! The PDF printer has no "fit the content" mode, so the page height must be
//! measured before printing: content extent + header height + bottom margin.
//! When the expected elements are missing the size is still produced from
//! fallbacks, but flagged `estimated` so the caller can warn about it.

use crate::config::SiteSelectors;
use crate::renderer::{PageSize, RenderError, Session};
use crate::scripts;
use serde::{Deserialize, Serialize};

/// Added in place of the header when no header element is found.
pub const HEADER_ESTIMATE_PX: u32 = 100;
/// Always added below the content.
pub const BOTTOM_MARGIN_PX: u32 = 50;
/// Used when nothing reported a usable width.
pub const DEFAULT_WIDTH_PX: u32 = 1280;

/// Target snapshot size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub height: u32,
    pub width: u32,
    /// A structural assumption failed and a fallback was used.
    pub estimated: bool,
}

impl Dimensions {
    pub fn page_size(&self) -> PageSize {
        PageSize {
            height: self.height,
            width: self.width,
            background: true,
        }
    }
}

/// Scroll extent of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Extent {
    pub height: u32,
    pub width: u32,
}

/// Raw measurements returned by [`scripts::layout_probe`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutProbe {
    pub content: Option<Extent>,
    #[serde(default)]
    pub candidates: Vec<Extent>,
    pub header: Option<u32>,
}

impl LayoutProbe {
    /// Combine the measurements into a page size.
    pub fn dimensions(&self) -> Dimensions {
        let mut estimated = false;

        let (content_height, content_width) = match self.content {
            Some(e) => (e.height, e.width),
            None => {
                estimated = true;
                let h = self.candidates.iter().map(|e| e.height).max().unwrap_or(0);
                let w = self.candidates.iter().map(|e| e.width).max().unwrap_or(0);
                (h, w)
            }
        };

        let header = match self.header {
            Some(h) => h,
            None => {
                estimated = true;
                HEADER_ESTIMATE_PX
            }
        };

        let width = if content_width == 0 {
            estimated = true;
            DEFAULT_WIDTH_PX
        } else {
            content_width
        };

        Dimensions {
            height: content_height
                .saturating_add(header)
                .saturating_add(BOTTOM_MARGIN_PX),
            width,
            estimated,
        }
    }
}

/// Measure the current page of `session`.
///
/// Run after navigation and after the stylesheet has been injected, since the
/// stylesheet changes the layout being measured.
pub async fn estimate(session: &dyn Session, selectors: &SiteSelectors) -> Result<Dimensions, RenderError> {
    let value = session.evaluate(&scripts::layout_probe(selectors)).await?;
    let probe: LayoutProbe =
        serde_json::from_value(value).map_err(|e| RenderError::Script(format!("layout probe: {e}")))?;
    Ok(probe.dimensions())
}
