//! Browser automation boundary.
//!
//! Drivers talk to websites only through these traits, so any engine can sit
//! behind them (Chromium via CDP in `trackline-client`, a scripted page in
//! tests). Every network-bound primitive takes an explicit timeout; waits
//! report [`WaitOutcome::TimedOut`] instead of failing so callers can fall
//! through to the next strategy.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

/// How to find an element on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector; first match wins.
    Css(&'static str),
    /// Innermost element whose visible text contains the string.
    Text(&'static str),
    /// First element matching the CSS selector whose visible text contains
    /// the string, e.g. `CssWithText("button", "Submit")`.
    CssWithText(&'static str, &'static str),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "{css}"),
            Locator::Text(text) => write!(f, "text={text}"),
            Locator::CssWithText(css, text) => write!(f, "{css}:has-text({text})"),
        }
    }
}

/// The document `<body>`.
pub const BODY: Locator = Locator::Css("body");

/// Page lifecycle states that can be awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    /// No network activity for a short quiet window.
    NetworkIdle,
}

/// Something a wait can be satisfied by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    Visible(Locator),
    Load(LoadState),
}

/// Explicit result of every wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Matched,
    TimedOut,
}

impl WaitOutcome {
    pub fn matched(self) -> bool {
        self == WaitOutcome::Matched
    }
}

/// A readable document scope: a page's main frame or an embedded frame.
#[async_trait]
pub trait Frame: Send + Sync {
    /// Visible text of the first element matched by `locator`.
    async fn inner_text(&self, locator: &Locator) -> Result<String, AppError>;

    /// Visible texts of the first `limit` elements matched by `locator`, in
    /// document order. No match is an empty list, not an error.
    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError>;

    /// Serialized markup of the whole document.
    async fn content(&self) -> Result<String, AppError>;

    async fn wait_for(
        &self,
        target: &WaitTarget,
        timeout: Duration,
    ) -> Result<WaitOutcome, AppError>;
}

/// A single browser tab.
#[async_trait]
pub trait Page: Frame {
    /// Navigate and wait for the document to load. Exceeding `timeout` is an
    /// [`AppError::Timeout`].
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AppError>;

    async fn url(&self) -> Result<String, AppError>;

    async fn is_visible(&self, locator: &Locator) -> Result<bool, AppError>;

    async fn is_enabled(&self, locator: &Locator) -> Result<bool, AppError>;

    async fn click(&self, locator: &Locator) -> Result<(), AppError>;

    /// Set the value directly, firing `input` and `change` events.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), AppError>;

    /// Focus the element and emit keystrokes for `text`.
    async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), AppError>;

    /// Press a named key (`"Enter"`, `"Tab"`, ...) on the element.
    async fn press(&self, locator: &Locator, key: &str) -> Result<(), AppError>;

    /// Dispatch a DOM event (`"change"`, `"blur"`, ...) on the element.
    async fn dispatch_event(&self, locator: &Locator, event: &str) -> Result<(), AppError>;

    /// PNG screenshot of the element's bounding box.
    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>, AppError>;

    /// Every frame of the page, main frame first.
    async fn frames(&self) -> Result<Vec<Box<dyn Frame>>, AppError>;

    /// Content frame of the `<iframe>` matched by `locator`, if attached.
    async fn child_frame(&self, locator: &Locator) -> Result<Option<Box<dyn Frame>>, AppError>;

    /// Click `locator` and wait up to `timeout` for a new tab it opens.
    /// `Ok(None)` means no tab appeared in time.
    async fn click_expecting_popup(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Box<dyn Page>>, AppError>;
}

/// One browser process with one isolated context and one page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> &dyn Page;

    /// Tear down the page, context, and process. Consumes the session so it
    /// cannot be closed twice.
    async fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// Opens a fresh session per resolution.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError>;

    /// False when this build cannot drive a browser at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Launcher used when browser support is compiled out.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLauncher;

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError> {
        Err(AppError::BrowserError(
            "browser automation is not available in this build".into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_display() {
        assert_eq!(Locator::Css("#awb").to_string(), "#awb");
        assert_eq!(Locator::Text("SHIPMENT DETAILS").to_string(), "text=SHIPMENT DETAILS");
        assert_eq!(
            Locator::CssWithText("button", "Submit").to_string(),
            "button:has-text(Submit)"
        );
    }

    #[tokio::test]
    async fn unavailable_launcher_refuses() {
        let launcher = UnavailableLauncher;
        assert!(!launcher.is_available());
        let err = launcher.launch().await.err().unwrap();
        assert!(matches!(err, AppError::BrowserError(_)));
    }
}
