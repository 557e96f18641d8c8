//! Chromium backend for [`Browser`] and [`Session`], over the DevTools
//! protocol via `chromiumoxide`.
//!
//! One browser process hosts every session; each session is one tab. Cookies
//! are installed and screen media is emulated as the tab opens, so printed
//! pages look like what a logged-in user sees rather than the print
//! stylesheet.
//!
//! A tab that is dropped without [`Session::close`] (a guide abandoned at its
//! deadline) is closed from a background task.

use crate::renderer::{Browser, Cookie, NavResponse, PageSize, RenderError, Session, WaitUntil};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetEmulatedMediaParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// CSS pixels per inch, the unit the printer expects.
const PX_PER_INCH: f64 = 96.0;

/// How long the page must have no request in flight to count as idle.
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

/// A launched Chromium process.
pub struct ChromiumBrowser {
    browser: Mutex<CdpBrowser>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch Chromium from `executable`, headless unless `headful` is set.
    pub async fn launch(executable: &Path, headful: bool) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        if headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(RenderError::Protocol)?;

        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(protocol)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Launched {}", executable.display());

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }

    /// Launch the browser found by `chrome-locate`, or `executable` if given.
    pub async fn launch_located(executable: Option<PathBuf>, headful: bool) -> Result<Self, RenderError> {
        let path = match executable {
            Some(p) => p,
            None => chrome_locate::locate_chrome().map_err(|e| RenderError::Transport(e.to_string()))?,
        };
        Self::launch(&path, headful).await
    }

    /// Close every tab and stop the process.
    pub async fn shutdown(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(protocol)?;
        browser.wait().await?;
        self.handler.abort();
        Ok(())
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open_session(&self, cookies: &[Cookie]) -> Result<Box<dyn Session>, RenderError> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await.map_err(protocol)?
        };

        if !cookies.is_empty() {
            let params: Vec<CookieParam> = cookies
                .iter()
                .map(|c| {
                    let mut p = CookieParam::new(c.name.clone(), c.value.clone());
                    p.domain = Some(c.domain.clone());
                    p.path = Some(c.path.clone());
                    p
                })
                .collect();
            page.set_cookies(params).await.map_err(protocol)?;
        }
        page.execute(SetEmulatedMediaParams::builder().media("screen").build())
            .await
            .map_err(protocol)?;

        Ok(Box::new(ChromiumSession {
            page: Some(page),
            runtime: tokio::runtime::Handle::current(),
        }))
    }
}

/// One browser tab.
pub struct ChromiumSession {
    page: Option<Page>,
    runtime: tokio::runtime::Handle,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Protocol("tab already closed".into()))
    }

    /// Start tracking requests when the navigation must end on a quiet network.
    async fn watch(&self, wait: WaitUntil) -> Result<Option<NetworkWatch>, RenderError> {
        match wait {
            WaitUntil::Load => Ok(None),
            WaitUntil::NetworkIdle => NetworkWatch::subscribe(self.page()?).await.map(Some),
        }
    }

    /// Status of the main-frame response of the navigation in progress.
    async fn main_response(&self) -> Result<NavResponse, RenderError> {
        let page = self.page()?;
        let request = page
            .wait_for_navigation_response()
            .await
            .map_err(transport)?
            .ok_or(RenderError::NoResponse)?;
        let status = request
            .response
            .as_ref()
            .map(|r| r.status)
            .ok_or(RenderError::NoResponse)?;
        Ok(NavResponse {
            status: u16::try_from(status).unwrap_or(0),
        })
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<NavResponse, RenderError> {
        let go = async {
            let watch = self.watch(wait).await?;
            self.page()?.goto(url).await.map_err(transport)?;
            let response = self.main_response().await?;
            if let Some(watch) = watch {
                watch.settle(NETWORK_QUIET_WINDOW).await;
            }
            Ok(response)
        };
        tokio::time::timeout(timeout, go)
            .await
            .map_err(|_| RenderError::Timeout {
                secs: timeout.as_secs(),
            })?
    }

    async fn reload(&self, wait: WaitUntil, timeout: Duration) -> Result<NavResponse, RenderError> {
        let go = async {
            let watch = self.watch(wait).await?;
            self.page()?.reload().await.map_err(transport)?;
            let response = self.main_response().await?;
            if let Some(watch) = watch {
                watch.settle(NETWORK_QUIET_WINDOW).await;
            }
            Ok(response)
        };
        tokio::time::timeout(timeout, go)
            .await
            .map_err(|_| RenderError::Timeout {
                secs: timeout.as_secs(),
            })?
    }

    async fn inject_style(&self, css: &str) -> Result<(), RenderError> {
        self.evaluate(&crate::scripts::inject_style(css)).await.map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| RenderError::Script(e.to_string()))
    }

    async fn render_to_file(&self, path: &Path, size: PageSize) -> Result<(), RenderError> {
        let params = PrintToPdfParams::builder()
            .print_background(size.background)
            .paper_width(f64::from(size.width) / PX_PER_INCH)
            .paper_height(f64::from(size.height) / PX_PER_INCH)
            .margin_top(0.0)
            .margin_bottom(0.0)
            .margin_left(0.0)
            .margin_right(0.0)
            .build();
        self.page()?.save_pdf(params, path).await.map_err(protocol)?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), RenderError> {
        if let Some(page) = self.page.take() {
            page.close().await.map_err(protocol)?;
        }
        Ok(())
    }
}

/// Request lifecycle events of one navigation.
struct NetworkWatch {
    started: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl NetworkWatch {
    async fn subscribe(page: &Page) -> Result<Self, RenderError> {
        page.execute(EnableParams::default()).await.map_err(protocol)?;
        Ok(Self {
            started: page.event_listener::<EventRequestWillBeSent>().await.map_err(protocol)?,
            finished: page.event_listener::<EventLoadingFinished>().await.map_err(protocol)?,
            failed: page.event_listener::<EventLoadingFailed>().await.map_err(protocol)?,
        })
    }

    /// Return once no request has been in flight for `window`. Requests that
    /// never finish keep this waiting; the caller's timeout bounds it.
    async fn settle(mut self, window: Duration) {
        let mut in_flight: HashSet<String> = HashSet::new();
        loop {
            let quiet = tokio::time::sleep(window);
            tokio::pin!(quiet);
            tokio::select! {
                Some(e) = self.started.next() => {
                    in_flight.insert(e.request_id.inner().clone());
                }
                Some(e) = self.finished.next() => {
                    in_flight.remove(e.request_id.inner());
                }
                Some(e) = self.failed.next() => {
                    in_flight.remove(e.request_id.inner());
                }
                _ = &mut quiet, if in_flight.is_empty() => {
                    debug!("Network quiet for {:?}", window);
                    return;
                }
                else => return,
            }
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!("Closing abandoned tab failed: {}", e);
                }
            });
        }
    }
}

fn protocol(e: CdpError) -> RenderError {
    RenderError::Protocol(e.to_string())
}

fn transport(e: CdpError) -> RenderError {
    match e {
        CdpError::Timeout => RenderError::Timeout { secs: 0 },
        other => RenderError::Transport(other.to_string()),
    }
}
