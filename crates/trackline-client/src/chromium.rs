use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, FrameId};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Element};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use trackline_core::browser::{
    BrowserLauncher, BrowserSession, Frame, LoadState, Locator, Page, WaitOutcome, WaitTarget,
};
use trackline_core::error::AppError;
use trackline_core::evasion::STEALTH_ARGS;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const TARGET_ATTR: &str = "data-trackline-target";

/// Resource-count stability window that counts as network idle.
const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Launches one headless (or headed) Chromium per tracking request.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    chrome_bin: Option<PathBuf>,
}

impl ChromiumLauncher {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            chrome_bin: None,
        }
    }

    pub fn with_chrome_bin(mut self, path: Option<PathBuf>) -> Self {
        self.chrome_bin = path;
        self
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// On systems where Chromium is installed via **snap**, the wrapper at
    /// `/snap/bin/chromium` strips unknown CLI flags. The real binary inside
    /// the snap is preferred, then well-known system paths. `None` lets
    /// `chromiumoxide` do its own lookup.
    fn find_chrome_binary(&self) -> Option<PathBuf> {
        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Some(path) = self.chrome_bin.as_ref().filter(|p| p.exists()) {
            return Some(path.clone());
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    fn config(&self) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .incognito()
            .window_size(1920, 1080)
            .viewport(None::<Viewport>)
            .request_timeout(REQUEST_TIMEOUT)
            .args(STEALTH_ARGS.iter().copied())
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--no-first-run");

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(bin) = self.find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError> {
        let (browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let browser = Arc::new(Mutex::new(browser));
        let page = match open_stealth_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = shutdown(&browser, handler_task).await {
                    tracing::warn!(error = %close_err, "Failed to close half-open browser");
                }
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            page: ChromiumPage::new(page, Arc::clone(&browser)),
            browser,
            handler_task,
        }))
    }
}

async fn open_stealth_page(browser: &Mutex<Browser>) -> Result<chromiumoxide::Page, AppError> {
    let page = browser
        .lock()
        .await
        .new_page("about:blank")
        .await
        .map_err(browser_err)?;
    page.enable_stealth_mode_with_agent(USER_AGENT)
        .await
        .map_err(browser_err)?;
    Ok(page)
}

fn browser_err(e: impl std::fmt::Display) -> AppError {
    AppError::BrowserError(e.to_string())
}

struct ChromiumSession {
    browser: Arc<Mutex<Browser>>,
    page: ChromiumPage,
    handler_task: JoinHandle<()>,
}

/// Close the browser process and stop polling its CDP connection.
async fn shutdown(browser: &Mutex<Browser>, handler_task: JoinHandle<()>) -> Result<(), AppError> {
    let mut browser = browser.lock().await;
    let closed = browser.close().await.map(|_| ()).map_err(browser_err);
    if let Err(e) = browser.wait().await {
        tracing::debug!(error = %e, "Browser process wait failed");
    }
    handler_task.abort();
    closed
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn page(&self) -> &dyn Page {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        let ChromiumSession {
            browser,
            page,
            handler_task,
        } = *self;
        drop(page);
        shutdown(&browser, handler_task).await
    }
}

/// A tab driven over CDP. Frames of the tab share the page handle and differ
/// only in the execution context their scripts run in.
#[derive(Clone)]
struct ChromiumPage {
    page: chromiumoxide::Page,
    browser: Arc<Mutex<Browser>>,
}

impl ChromiumPage {
    fn new(page: chromiumoxide::Page, browser: Arc<Mutex<Browser>>) -> Self {
        Self { page, browser }
    }

    fn main_scope(&self) -> Scope<'_> {
        Scope {
            page: &self.page,
            context: None,
        }
    }

    /// Mark the element matched by `locator` and fetch a CDP handle to it.
    async fn element(&self, locator: &Locator) -> Result<Element, AppError> {
        let tagged: bool = self
            .main_scope()
            .eval(&format!(
                "(() => {{ const el = {find}; \
                   document.querySelectorAll('[{TARGET_ATTR}]').forEach(e => e.removeAttribute('{TARGET_ATTR}')); \
                   if (!el) return false; el.setAttribute('{TARGET_ATTR}', '1'); return true; }})()",
                find = locate_js(locator),
            ))
            .await?;
        if !tagged {
            return Err(AppError::BrowserError(format!("No element matches {locator}")));
        }
        self.page
            .find_element(format!("[{TARGET_ATTR}]"))
            .await
            .map_err(browser_err)
    }

    async fn on_element(&self, locator: &Locator, body: &str) -> Result<(), AppError> {
        let found: bool = self
            .main_scope()
            .eval(&format!(
                "(() => {{ const el = {find}; if (!el) return false; {body}; return true; }})()",
                find = locate_js(locator),
            ))
            .await?;
        if found {
            Ok(())
        } else {
            Err(AppError::BrowserError(format!("No element matches {locator}")))
        }
    }

    async fn frame_scope(&self, frame_id: FrameId) -> Result<Option<ChromiumFrame>, AppError> {
        let context = self
            .page
            .frame_execution_context(frame_id)
            .await
            .map_err(browser_err)?;
        Ok(context.map(|context| ChromiumFrame {
            page: self.page.clone(),
            context: Some(context),
        }))
    }
}

/// Where a script is evaluated.
struct Scope<'a> {
    page: &'a chromiumoxide::Page,
    context: Option<ExecutionContextId>,
}

impl Scope<'_> {
    /// Evaluate `expression` and decode its JSON-serialized result.
    async fn eval<T: DeserializeOwned>(&self, expression: &str) -> Result<T, AppError> {
        let mut params = EvaluateParams::new(format!("JSON.stringify({expression})"));
        params.context_id = self.context;
        params.return_by_value = Some(true);
        params.await_promise = Some(true);

        let raw: String = self
            .page
            .evaluate(params)
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn inner_text(&self, locator: &Locator) -> Result<String, AppError> {
        let text: Option<String> = self
            .eval(&format!(
                "(() => {{ const el = {}; return el ? el.innerText : null; }})()",
                locate_js(locator)
            ))
            .await?;
        text.ok_or_else(|| AppError::BrowserError(format!("No element matches {locator}")))
    }

    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError> {
        self.eval(&format!(
            "{}.slice(0, {limit}).map(el => el.innerText || '')",
            locate_all_js(locator)
        ))
        .await
    }

    async fn content(&self) -> Result<String, AppError> {
        self.eval("document.documentElement ? document.documentElement.outerHTML : ''")
            .await
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, AppError> {
        self.eval(&format!(
            "(() => {{ const el = {}; if (!el) return false; \
               const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
               return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            locate_js(locator)
        ))
        .await
    }

    async fn resource_count(&self) -> Result<(bool, u64), AppError> {
        self.eval(
            "[document.readyState === 'complete', performance.getEntriesByType('resource').length]",
        )
        .await
    }

    async fn poll(&self, target: &WaitTarget) -> Result<bool, AppError> {
        match target {
            WaitTarget::Visible(locator) => self.is_visible(locator).await,
            WaitTarget::Load(LoadState::DomContentLoaded) => {
                self.eval::<bool>("document.readyState !== 'loading'").await
            }
            WaitTarget::Load(LoadState::NetworkIdle) => {
                let (complete, before) = self.resource_count().await?;
                if !complete {
                    return Ok(false);
                }
                tokio::time::sleep(QUIET_WINDOW).await;
                let (complete, after) = self.resource_count().await?;
                Ok(complete && after == before)
            }
        }
    }

    async fn wait_for(&self, target: &WaitTarget, timeout: Duration) -> Result<WaitOutcome, AppError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Evaluation errors during navigation are transient.
            if self.poll(target).await.unwrap_or(false) {
                return Ok(WaitOutcome::Matched);
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// JavaScript expression evaluating to the first element matched by
/// `locator`, or `null`.
fn locate_js(locator: &Locator) -> String {
    let quote = |s: &str| serde_json::Value::from(s).to_string();
    match locator {
        Locator::Css(css) => format!("document.querySelector({})", quote(css)),
        // The last element in document order containing the text is the
        // innermost one.
        Locator::Text(text) => format!(
            "(() => {{ let hit = null; for (const el of document.querySelectorAll('body *')) \
               {{ if ((el.innerText || '').includes({})) hit = el; }} return hit; }})()",
            quote(text)
        ),
        Locator::CssWithText(css, text) => format!(
            "(Array.from(document.querySelectorAll({})).find(el => (el.innerText || '').includes({})) || null)",
            quote(css),
            quote(text)
        ),
    }
}

/// JavaScript expression evaluating to the array of every element matched
/// by `locator`, in document order.
fn locate_all_js(locator: &Locator) -> String {
    let quote = |s: &str| serde_json::Value::from(s).to_string();
    match locator {
        Locator::Css(css) => format!("Array.from(document.querySelectorAll({}))", quote(css)),
        Locator::Text(text) => format!(
            "Array.from(document.querySelectorAll('body *')).filter(el => (el.innerText || '').includes({}))",
            quote(text)
        ),
        Locator::CssWithText(css, text) => format!(
            "Array.from(document.querySelectorAll({})).filter(el => (el.innerText || '').includes({}))",
            quote(css),
            quote(text)
        ),
    }
}

#[async_trait]
impl Frame for ChromiumPage {
    async fn inner_text(&self, locator: &Locator) -> Result<String, AppError> {
        self.main_scope().inner_text(locator).await
    }

    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError> {
        self.main_scope().inner_texts(locator, limit).await
    }

    async fn content(&self) -> Result<String, AppError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn wait_for(&self, target: &WaitTarget, timeout: Duration) -> Result<WaitOutcome, AppError> {
        self.main_scope().wait_for(target, timeout).await
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AppError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::BrowserError(format!("Failed to navigate to {url}: {e}"))),
            Err(_) => Err(AppError::Timeout(timeout.as_secs())),
        }
    }

    async fn url(&self) -> Result<String, AppError> {
        Ok(self.page.url().await.map_err(browser_err)?.unwrap_or_default())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, AppError> {
        self.main_scope().is_visible(locator).await
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool, AppError> {
        self.main_scope()
            .eval(&format!(
                "(() => {{ const el = {}; return !!el && !el.disabled && el.getAttribute('aria-disabled') !== 'true'; }})()",
                locate_js(locator)
            ))
            .await
    }

    async fn click(&self, locator: &Locator) -> Result<(), AppError> {
        self.element(locator)
            .await?
            .click()
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), AppError> {
        let value = serde_json::Value::from(text).to_string();
        self.on_element(
            locator,
            &format!(
                "el.focus(); el.value = {value}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}))"
            ),
        )
        .await
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), AppError> {
        let element = self.element(locator).await?;
        element.focus().await.map_err(browser_err)?;
        element.type_str(text).await.map_err(browser_err)?;
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<(), AppError> {
        let element = self.element(locator).await?;
        element.focus().await.map_err(browser_err)?;
        element.press_key(key).await.map_err(browser_err)?;
        Ok(())
    }

    async fn dispatch_event(&self, locator: &Locator, event: &str) -> Result<(), AppError> {
        let event = serde_json::Value::from(event).to_string();
        self.on_element(
            locator,
            &format!("el.dispatchEvent(new Event({event}, {{ bubbles: true }}))"),
        )
        .await
    }

    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>, AppError> {
        self.element(locator)
            .await?
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(browser_err)
    }

    async fn frames(&self) -> Result<Vec<Box<dyn Frame>>, AppError> {
        let main = self.page.mainframe().await.map_err(browser_err)?;
        let mut frames: Vec<Box<dyn Frame>> = vec![Box::new(self.clone())];
        for frame_id in self.page.frames().await.map_err(browser_err)? {
            if Some(&frame_id) == main.as_ref() {
                continue;
            }
            if let Some(frame) = self.frame_scope(frame_id).await? {
                frames.push(Box::new(frame));
            }
        }
        Ok(frames)
    }

    async fn child_frame(&self, locator: &Locator) -> Result<Option<Box<dyn Frame>>, AppError> {
        let src: Option<String> = self
            .main_scope()
            .eval(&format!(
                "(() => {{ const el = {}; return el && el.tagName === 'IFRAME' ? el.src : null; }})()",
                locate_js(locator)
            ))
            .await?;
        let Some(src) = src else {
            return Ok(None);
        };

        let main = self.page.mainframe().await.map_err(browser_err)?;
        let mut children = Vec::new();
        for frame_id in self.page.frames().await.map_err(browser_err)? {
            if Some(&frame_id) == main.as_ref() {
                continue;
            }
            let url = self
                .page
                .frame_url(frame_id.clone())
                .await
                .map_err(browser_err)?;
            if url.as_deref() == Some(src.as_str()) {
                return Ok(self.frame_scope(frame_id).await?.map(|f| Box::new(f) as Box<dyn Frame>));
            }
            children.push(frame_id);
        }

        // Redirected frames no longer carry their src URL; a lone child is
        // still unambiguous.
        match children.as_slice() {
            [only] => Ok(self
                .frame_scope(only.clone())
                .await?
                .map(|f| Box::new(f) as Box<dyn Frame>)),
            _ => Ok(None),
        }
    }

    async fn click_expecting_popup(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Box<dyn Page>>, AppError> {
        let before: Vec<_> = {
            let browser = self.browser.lock().await;
            browser
                .pages()
                .await
                .map_err(browser_err)?
                .iter()
                .map(|p| p.target_id().clone())
                .collect()
        };

        self.click(locator).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pages = self.browser.lock().await.pages().await.map_err(browser_err)?;
            if let Some(popup) = pages.into_iter().find(|p| !before.contains(p.target_id())) {
                let url = popup.url().await.ok().flatten();
                tracing::debug!(url = ?url, "Popup opened");
                return Ok(Some(Box::new(ChromiumPage::new(
                    popup,
                    Arc::clone(&self.browser),
                ))));
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// An embedded document of a [`ChromiumPage`].
struct ChromiumFrame {
    page: chromiumoxide::Page,
    context: Option<ExecutionContextId>,
}

impl ChromiumFrame {
    fn scope(&self) -> Scope<'_> {
        Scope {
            page: &self.page,
            context: self.context,
        }
    }
}

#[async_trait]
impl Frame for ChromiumFrame {
    async fn inner_text(&self, locator: &Locator) -> Result<String, AppError> {
        self.scope().inner_text(locator).await
    }

    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError> {
        self.scope().inner_texts(locator, limit).await
    }

    async fn content(&self) -> Result<String, AppError> {
        self.scope().content().await
    }

    async fn wait_for(&self, target: &WaitTarget, timeout: Duration) -> Result<WaitOutcome, AppError> {
        self.scope().wait_for(target, timeout).await
    }
}
