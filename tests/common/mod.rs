//! In-memory scripted site and browser for pipeline tests.
//!
//! The fake browser recognises in-page scripts by comparing them with the
//! library's own script builders, answers with the scripted site structure,
//! and "prints" real (tiny) PDFs carrying a marker string so tests can check
//! which section ended up on which page of a merged guide.

#![allow(dead_code)]

use async_trait::async_trait;
use guide2pdf::config::{BinderConfigBuilder, SiteSelectors};
use guide2pdf::renderer::{Browser, Cookie, NavResponse, PageSize, RenderError, Session, WaitUntil};
use guide2pdf::{scripts, BinderConfig};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CATALOG_URL: &str = "https://guides.test/account/my_guides";

/// Padding written into every snapshot unless scripted otherwise.
pub const FULL_PAD: usize = 12_000;

/// `min_bytes` used by [`test_config`]; an unpadded snapshot is below it.
pub const TEST_MIN_BYTES: u64 = 5_000;

// ── Site ─────────────────────────────────────────────────────────────────

/// The scripted remote site.
#[derive(Default)]
pub struct Site {
    /// `(url, raw title)` in catalog order.
    pub catalog: Vec<(String, String)>,
    /// Guide landing URL → section URLs in table-of-contents order.
    pub guides: HashMap<String, Vec<String>>,
    /// URL → statuses returned by successive navigations/reloads; 200 once drained.
    pub statuses: Mutex<HashMap<String, VecDeque<u16>>>,
    /// Section URL → snapshot padding per render; the last value repeats.
    pub pads: Mutex<HashMap<String, VecDeque<usize>>>,
    /// URL → delay before the navigation answers.
    pub latency: HashMap<String, Duration>,
    /// Section URLs whose render fails at the protocol level.
    pub broken_renders: HashSet<String>,
}

impl Site {
    /// A catalog of `(slug, raw title, section count)` guides.
    pub fn with_guides(guides: &[(&str, &str, usize)]) -> Self {
        let mut site = Site::default();
        for &(slug, title, sections) in guides {
            let url = guide_url(slug);
            site.catalog.push((url.clone(), title.to_string()));
            site.guides.insert(
                url,
                (1..=sections).map(|i| section_url(slug, i)).collect(),
            );
        }
        site
    }

    /// Answer every navigation of `url` with `status`, `times` times.
    pub fn fail_status(&self, url: &str, status: u16, times: usize) {
        self.statuses
            .lock()
            .unwrap()
            .insert(url.to_string(), std::iter::repeat(status).take(times).collect());
    }

    pub fn set_pads(&self, url: &str, pads: &[usize]) {
        self.pads
            .lock()
            .unwrap()
            .insert(url.to_string(), pads.iter().copied().collect());
    }

    fn next_status(&self, url: &str) -> u16 {
        self.statuses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front())
            .unwrap_or(200)
    }

    fn next_pad(&self, url: &str) -> usize {
        let mut pads = self.pads.lock().unwrap();
        match pads.get_mut(url) {
            Some(q) if q.len() > 1 => q.pop_front().unwrap_or(FULL_PAD),
            Some(q) => q.front().copied().unwrap_or(FULL_PAD),
            None => FULL_PAD,
        }
    }
}

pub fn guide_url(slug: &str) -> String {
    format!("https://guides.test/guide/{slug}")
}

pub fn section_url(slug: &str, index: usize) -> String {
    format!("https://guides.test/guide/{slug}/section/{index}")
}

// ── Counters ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub navigations: AtomicUsize,
    pub renders: AtomicUsize,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

// ── Browser ──────────────────────────────────────────────────────────────

pub struct MockBrowser {
    pub site: Arc<Site>,
    pub stats: Arc<Stats>,
}

impl MockBrowser {
    pub fn new(site: Site) -> Arc<Self> {
        Arc::new(Self {
            site: Arc::new(site),
            stats: Arc::new(Stats::default()),
        })
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn open_session(&self, _cookies: &[Cookie]) -> Result<Box<dyn Session>, RenderError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            current: Mutex::new(None),
        }))
    }
}

pub struct MockSession {
    site: Arc<Site>,
    stats: Arc<Stats>,
    current: Mutex<Option<String>>,
}

impl MockSession {
    fn current(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    async fn visit(&self, url: &str) -> Result<NavResponse, RenderError> {
        self.stats.navigations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.site.latency.get(url) {
            tokio::time::sleep(*delay).await;
        }
        *self.current.lock().unwrap() = Some(url.to_string());
        Ok(NavResponse {
            status: self.site.next_status(url),
        })
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<NavResponse, RenderError> {
        self.visit(url).await
    }

    async fn reload(&self, _wait: WaitUntil, _timeout: Duration) -> Result<NavResponse, RenderError> {
        let url = self.current().ok_or(RenderError::NoResponse)?;
        self.visit(&url).await
    }

    async fn inject_style(&self, _css: &str) -> Result<(), RenderError> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let sel = SiteSelectors::default();
        let current = self.current().unwrap_or_default();

        if script == scripts::catalog_entries(&sel) {
            if current != CATALOG_URL {
                return Ok(serde_json::json!([]));
            }
            let entries: Vec<_> = self
                .site
                .catalog
                .iter()
                .map(|(url, title)| serde_json::json!({ "url": url, "title": title }))
                .collect();
            Ok(serde_json::Value::Array(entries))
        } else if script == scripts::toc_links(&sel) {
            let links = self.site.guides.get(&current).cloned().unwrap_or_default();
            Ok(serde_json::json!(links))
        } else if script == scripts::layout_probe(&sel) {
            Ok(serde_json::json!({
                "content": { "height": 2400, "width": 1000 },
                "candidates": [{ "height": 2600, "width": 1024 }],
                "header": 80,
            }))
        } else {
            Err(RenderError::Script(format!("unexpected script: {script:.40}")))
        }
    }

    async fn render_to_file(&self, path: &Path, _size: PageSize) -> Result<(), RenderError> {
        self.stats.renders.fetch_add(1, Ordering::SeqCst);
        let url = self.current().ok_or(RenderError::NoResponse)?;
        if self.site.broken_renders.contains(&url) {
            return Err(RenderError::Protocol("Printing failed".into()));
        }
        write_marker_pdf(path, &url, self.site.next_pad(&url))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── PDF helpers ──────────────────────────────────────────────────────────

/// Write a one-page PDF showing `marker`, padded with a content-stream
/// comment of `pad` bytes.
pub fn write_marker_pdf(path: &Path, marker: &str, pad: usize) -> std::io::Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut content = format!("BT /F1 12 Tf 20 20 Td ({marker}) Tj ET\n").into_bytes();
    if pad > 0 {
        content.push(b'%');
        content.extend(std::iter::repeat(b'x').take(pad));
        content.push(b'\n');
    }
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), 750.into(), 1900.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

/// Decoded content of every page of `path`, in page order.
pub fn page_contents(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}

// ── Logging ──────────────────────────────────────────────────────────────

/// Route pipeline logs to the test writer; `RUST_LOG=guide2pdf=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Config ───────────────────────────────────────────────────────────────

/// No cool-downs, small thresholds, retry budget 3.
pub fn test_config(output: &Path) -> BinderConfigBuilder {
    BinderConfig::builder()
        .output_path(output)
        .max_retries(3)
        .min_bytes(TEST_MIN_BYTES)
        .navigation_cooldown_ms(0)
        .render_cooldown_ms(0)
        .settle_ms(0)
}

pub fn test_inputs() -> guide2pdf::BindInputs {
    guide2pdf::BindInputs {
        catalog_url: CATALOG_URL.to_string(),
        cookies: vec![Cookie {
            name: "sid".into(),
            value: "secret".into(),
            domain: ".guides.test".into(),
            path: "/".into(),
        }],
        stylesheet: "header { position: static; }".into(),
    }
}
