//! Rendering-engine capability interface.
//!
//! The pipeline never talks to a browser directly. It drives the two traits
//! below, one method per capability it needs, so the same code runs against
//! Chromium ([`crate::chromium`]) or an in-memory scripted double in tests.
//!
//! A [`Browser`] is the shared, long-lived resource (one process, one login
//! state). A [`Session`] is one tab opened from it; sessions are independent
//! and may be driven concurrently from different tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a renderer implementation.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The request never produced a response (connection reset, DNS, aborted
    /// navigation).
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation did not complete within its absolute timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Navigation finished but no main-document response was recorded.
    #[error("no response recorded for navigation")]
    NoResponse,

    /// An in-page script threw or returned something unusable.
    #[error("script error: {0}")]
    Script(String),

    /// Any other protocol-level failure reported by the engine.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local I/O while writing a snapshot.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// `load` fired and then no request was in flight for 500 ms.
    #[default]
    NetworkIdle,
}

/// The main-document response of a navigation or reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavResponse {
    pub status: u16,
}

impl NavResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Requested snapshot page size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub height: u32,
    pub width: u32,
    /// Print CSS backgrounds. Always requested by the pipeline.
    pub background: bool,
}

/// A cookie record as exported from a logged-in browser profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// The shared rendering resource that hands out sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new tab carrying `cookies`, with JavaScript enabled and screen
    /// media emulation applied.
    async fn open_session(&self, cookies: &[Cookie]) -> Result<Box<dyn Session>, RenderError>;
}

/// One tab. Methods are called sequentially by a single task.
#[async_trait]
pub trait Session: Send + Sync {
    /// Navigate to `url`. `Err` means the response is absent.
    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<NavResponse, RenderError>;

    /// Reload the current document. `Err` means the response is absent.
    async fn reload(&self, wait: WaitUntil, timeout: Duration) -> Result<NavResponse, RenderError>;

    /// Append a `<style>` element containing `css` to the current document.
    async fn inject_style(&self, css: &str) -> Result<(), RenderError>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError>;

    /// Print the current document to a PDF file at `path`, overwriting it.
    async fn render_to_file(&self, path: &Path, size: PageSize) -> Result<(), RenderError>;

    /// Close the tab.
    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}
