//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{
    BrowserLauncher, BrowserSession, Frame, LoadState, Locator, Page, WaitOutcome, WaitTarget,
};
use crate::drivers::Driver;
use crate::error::AppError;
use crate::models::{
    AcquisitionResult, Identifier, Mode, Resolution, StatusRecord, TrackingReport,
    TrackingRequest,
};
use crate::traits::{
    CaptchaSolver, Cleaner, FastPath, FastPathOutcome, MissReason, StatusModel, Tracker,
};

/// Bytes returned for every scripted screenshot.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn wrap_markup(body: &str) -> String {
    format!("<html><body>{body}</body></html>")
}

fn scripted_elements(
    elements: &HashMap<Locator, Vec<String>>,
    locator: &Locator,
    limit: usize,
) -> Vec<String> {
    elements
        .get(locator)
        .map(|texts| texts.iter().take(limit).cloned().collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ScriptedFrame
// ---------------------------------------------------------------------------

/// Static document scope with fixed text and markup.
#[derive(Clone, Default)]
pub struct ScriptedFrame {
    body: String,
    content: Option<String>,
    visible: HashSet<Locator>,
    elements: HashMap<Locator, Vec<String>>,
}

impl ScriptedFrame {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, markup: impl Into<String>) -> Self {
        self.content = Some(markup.into());
        self
    }

    pub fn with_visible(mut self, locator: Locator) -> Self {
        self.visible.insert(locator);
        self
    }

    pub fn with_elements(mut self, locator: Locator, texts: &[&str]) -> Self {
        self.elements
            .insert(locator, texts.iter().map(|t| t.to_string()).collect());
        self
    }
}

#[async_trait]
impl Frame for ScriptedFrame {
    async fn inner_text(&self, _locator: &Locator) -> Result<String, AppError> {
        Ok(self.body.clone())
    }

    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError> {
        Ok(scripted_elements(&self.elements, locator, limit))
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self
            .content
            .clone()
            .unwrap_or_else(|| wrap_markup(&self.body)))
    }

    async fn wait_for(
        &self,
        target: &WaitTarget,
        _timeout: Duration,
    ) -> Result<WaitOutcome, AppError> {
        Ok(match target {
            WaitTarget::Visible(locator) if !self.visible.contains(locator) => {
                WaitOutcome::TimedOut
            }
            _ => WaitOutcome::Matched,
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedPage
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PageState {
    body: String,
    content: Option<String>,
    visible: HashSet<Locator>,
    disabled: HashSet<Locator>,
    failing_keystrokes: bool,
    network_idle: bool,
    navigation_timeout: bool,
    elements: HashMap<Locator, Vec<String>>,
    frames: Vec<ScriptedFrame>,
    child_frames: HashMap<Locator, ScriptedFrame>,
    popups: VecDeque<Option<ScriptedPage>>,
    values: HashMap<Locator, String>,
    actions: Vec<String>,
    visited: Vec<String>,
    screenshots: usize,
}

/// Scripted browser page that records every interaction.
///
/// Waits for elements match only locators registered with
/// [`ScriptedPage::with_visible`]; nothing ever sleeps. Clones share state,
/// so a clone kept by the test observes what the code under test did.
#[derive(Clone, Default)]
pub struct ScriptedPage {
    state: Arc<Mutex<PageState>>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(self, f: impl FnOnce(&mut PageState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    fn record(&self, action: String) {
        self.state.lock().unwrap().actions.push(action);
    }

    /// Visible text of `<body>`.
    pub fn with_body(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.update(|s| s.body = text)
    }

    /// Raw markup; defaults to the body wrapped in `<html><body>`.
    pub fn with_content(self, markup: impl Into<String>) -> Self {
        let markup = markup.into();
        self.update(|s| s.content = Some(markup))
    }

    pub fn with_visible(self, locator: Locator) -> Self {
        self.update(|s| {
            s.visible.insert(locator);
        })
    }

    pub fn with_disabled(self, locator: Locator) -> Self {
        self.update(|s| {
            s.disabled.insert(locator);
        })
    }

    /// Every keystroke fails, forcing the direct-fill fallback.
    pub fn with_failing_keystrokes(self) -> Self {
        self.update(|s| s.failing_keystrokes = true)
    }

    pub fn with_network_idle(self) -> Self {
        self.update(|s| s.network_idle = true)
    }

    pub fn with_navigation_timeout(self) -> Self {
        self.update(|s| s.navigation_timeout = true)
    }

    /// Extra frame after the main frame.
    pub fn with_frame(self, frame: ScriptedFrame) -> Self {
        self.update(|s| s.frames.push(frame))
    }

    /// Content frame of the `<iframe>` matched by `locator`.
    /// Texts of every element matched by `locator`, for multi-element reads.
    pub fn with_elements(self, locator: Locator, texts: &[&str]) -> Self {
        self.update(|s| {
            s.elements
                .insert(locator, texts.iter().map(|t| t.to_string()).collect());
        })
    }

    pub fn with_child_frame(self, locator: Locator, frame: ScriptedFrame) -> Self {
        self.update(|s| {
            s.child_frames.insert(locator, frame);
        })
    }

    /// Queue the result of the next popup-expecting click. `None` means no
    /// tab opens. An empty queue behaves like `None`.
    pub fn with_popup(self, popup: Option<ScriptedPage>) -> Self {
        self.update(|s| s.popups.push_back(popup))
    }

    /// Every recorded action, in order (`"click #x"`, `"fill #x=v"`, ...).
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    /// Locators clicked, including popup-expecting clicks.
    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| a.strip_prefix("click ").map(str::to_string))
            .collect()
    }

    /// Current value of an input field.
    pub fn value_of(&self, locator: &Locator) -> String {
        self.state
            .lock()
            .unwrap()
            .values
            .get(locator)
            .cloned()
            .unwrap_or_default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn screenshots(&self) -> usize {
        self.state.lock().unwrap().screenshots
    }
}

#[async_trait]
impl Frame for ScriptedPage {
    async fn inner_text(&self, _locator: &Locator) -> Result<String, AppError> {
        Ok(self.state.lock().unwrap().body.clone())
    }

    async fn inner_texts(&self, locator: &Locator, limit: usize) -> Result<Vec<String>, AppError> {
        Ok(scripted_elements(&self.state.lock().unwrap().elements, locator, limit))
    }

    async fn content(&self) -> Result<String, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .content
            .clone()
            .unwrap_or_else(|| wrap_markup(&state.body)))
    }

    async fn wait_for(
        &self,
        target: &WaitTarget,
        _timeout: Duration,
    ) -> Result<WaitOutcome, AppError> {
        let state = self.state.lock().unwrap();
        let matched = match target {
            WaitTarget::Visible(locator) => state.visible.contains(locator),
            WaitTarget::Load(LoadState::DomContentLoaded) => true,
            WaitTarget::Load(LoadState::NetworkIdle) => state.network_idle,
        };
        Ok(if matched {
            WaitOutcome::Matched
        } else {
            WaitOutcome::TimedOut
        })
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("goto {url}"));
        if state.navigation_timeout {
            return Err(AppError::Timeout(timeout.as_secs()));
        }
        state.visited.push(url.to_string());
        Ok(())
    }

    async fn url(&self) -> Result<String, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .visited
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().visible.contains(locator))
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool, AppError> {
        Ok(!self.state.lock().unwrap().disabled.contains(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<(), AppError> {
        self.record(format!("click {locator}"));
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("fill {locator}={text}"));
        state.values.insert(*locator, text.to_string());
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_keystrokes {
            return Err(AppError::BrowserError("keystrokes rejected".into()));
        }
        state.actions.push(format!("type {locator}={text}"));
        state.values.entry(*locator).or_default().push_str(text);
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<(), AppError> {
        self.record(format!("press {locator}={key}"));
        Ok(())
    }

    async fn dispatch_event(&self, locator: &Locator, event: &str) -> Result<(), AppError> {
        self.record(format!("dispatch {locator}={event}"));
        Ok(())
    }

    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>, AppError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("screenshot {locator}"));
        state.screenshots += 1;
        Ok(FAKE_PNG.to_vec())
    }

    async fn frames(&self) -> Result<Vec<Box<dyn Frame>>, AppError> {
        let state = self.state.lock().unwrap();
        let main = ScriptedFrame::new(state.body.clone());
        let mut frames: Vec<Box<dyn Frame>> = vec![Box::new(main)];
        for frame in &state.frames {
            frames.push(Box::new(frame.clone()));
        }
        Ok(frames)
    }

    async fn child_frame(&self, locator: &Locator) -> Result<Option<Box<dyn Frame>>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .child_frames
            .get(locator)
            .cloned()
            .map(|frame| Box::new(frame) as Box<dyn Frame>))
    }

    async fn click_expecting_popup(
        &self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<Option<Box<dyn Page>>, AppError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("click {locator}"));
        Ok(state
            .popups
            .pop_front()
            .flatten()
            .map(|page| Box::new(page) as Box<dyn Page>))
    }
}

// ---------------------------------------------------------------------------
// MockLauncher
// ---------------------------------------------------------------------------

/// Launcher handing out sessions over one shared [`ScriptedPage`] and
/// counting launches and closes.
///
/// With [`MockLauncher::fresh_pages`] every launch gets its own blank page
/// instead; [`MockLauncher::pages`] returns them in launch order.
#[derive(Clone, Default)]
pub struct MockLauncher {
    page: ScriptedPage,
    fail: bool,
    fresh: bool,
    issued: Arc<Mutex<Vec<ScriptedPage>>>,
    launches: Arc<Mutex<usize>>,
    closes: Arc<Mutex<usize>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(page: ScriptedPage) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Every launch fails with a browser error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn fresh_pages() -> Self {
        Self {
            fresh: true,
            ..Self::default()
        }
    }

    pub fn pages(&self) -> Vec<ScriptedPage> {
        self.issued.lock().unwrap().clone()
    }

    pub fn launches(&self) -> usize {
        *self.launches.lock().unwrap()
    }

    pub fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AppError> {
        if self.fail {
            return Err(AppError::BrowserError("failed to launch browser".into()));
        }
        *self.launches.lock().unwrap() += 1;
        let page = if self.fresh {
            ScriptedPage::new()
        } else {
            self.page.clone()
        };
        self.issued.lock().unwrap().push(page.clone());
        Ok(Box::new(MockSession {
            page,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MockSession {
    page: ScriptedPage,
    closes: Arc<Mutex<usize>>,
}

#[async_trait]
impl BrowserSession for MockSession {
    fn page(&self) -> &dyn Page {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum DriverBehavior {
    Text(String),
    Fail(String),
    Panic,
    Hang,
}

/// Driver with a fixed behavior that records the identifiers it was given.
#[derive(Clone)]
pub struct MockDriver {
    name: &'static str,
    behavior: DriverBehavior,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDriver {
    fn with_behavior(name: &'static str, behavior: DriverBehavior) -> Self {
        Self {
            name,
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared driver that returns empty text; handy for route tables.
    pub fn named(name: &'static str) -> Arc<dyn Driver> {
        Arc::new(Self::returning(name, ""))
    }

    pub fn returning(name: &'static str, text: &str) -> Self {
        Self::with_behavior(name, DriverBehavior::Text(text.to_string()))
    }

    /// Fails with a site interaction error carrying `message`.
    pub fn failing(name: &'static str, message: &str) -> Self {
        Self::with_behavior(name, DriverBehavior::Fail(message.to_string()))
    }

    pub fn panicking(name: &'static str) -> Self {
        Self::with_behavior(name, DriverBehavior::Panic)
    }

    /// Never completes.
    pub fn hanging(name: &'static str) -> Self {
        Self::with_behavior(name, DriverBehavior::Hang)
    }

    /// Normalized identifiers this driver was invoked with.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn drive(&self, _page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push(identifier.normalized().to_string());
        match &self.behavior {
            DriverBehavior::Text(text) => Ok(text.clone()),
            DriverBehavior::Fail(message) => Err(AppError::site(self.name, message.clone())),
            DriverBehavior::Panic => panic!("{} driver exploded", self.name),
            DriverBehavior::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// MockSolver
// ---------------------------------------------------------------------------

/// Captcha solver with queued answers and an optional fixed fallback.
#[derive(Clone)]
pub struct MockSolver {
    answers: Arc<Mutex<Vec<Result<Option<String>, AppError>>>>,
    fallback: Option<String>,
    calls: Arc<Mutex<usize>>,
}

impl MockSolver {
    /// Answers in order; once exhausted, answers `None`.
    pub fn new(answers: Vec<Result<Option<String>, AppError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers)),
            fallback: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Always answers `text`.
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CaptchaSolver for MockSolver {
    async fn solve(&self, _png: &[u8]) -> Result<Option<String>, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            Ok(self.fallback.clone())
        } else {
            answers.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockFastPath
// ---------------------------------------------------------------------------

/// Fast path with a fixed outcome that records queried identifiers.
#[derive(Clone)]
pub struct MockFastPath {
    outcome: FastPathOutcome,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockFastPath {
    pub fn found(snippet: impl Into<String>) -> Self {
        Self {
            outcome: FastPathOutcome::Found(snippet.into()),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn miss(reason: MissReason) -> Self {
        Self {
            outcome: FastPathOutcome::Miss(reason),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl FastPath for MockFastPath {
    async fn query(&self, identifier: &Identifier, _mode: Mode) -> FastPathOutcome {
        self.queries
            .lock()
            .unwrap()
            .push(identifier.normalized().to_string());
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// MockStatusModel
// ---------------------------------------------------------------------------

/// Status model with queued JSON answers. Records `(system, user)` prompts.
#[derive(Clone)]
pub struct MockStatusModel {
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockStatusModel {
    pub fn new(responses: Vec<Result<serde_json::Value, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl StatusModel for MockStatusModel {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(AppError::LlmError {
                message: "no scripted response".into(),
                status_code: 500,
                retryable: false,
            })
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Cleaner that drops everything between `<` and `>`.
#[derive(Clone, Default)]
pub struct MockCleaner {
    calls: Arc<Mutex<usize>>,
}

impl MockCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut out = String::with_capacity(html.len());
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => out.push(c),
                _ => {}
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MockTracker
// ---------------------------------------------------------------------------

/// Tracker answering every request with a fixed status record.
#[derive(Clone)]
pub struct MockTracker {
    record: StatusRecord,
    browser: bool,
    requests: Arc<Mutex<Vec<TrackingRequest>>>,
}

impl MockTracker {
    pub fn new(record: StatusRecord) -> Self {
        Self {
            record,
            browser: true,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_browser(mut self) -> Self {
        self.browser = false;
        self
    }

    pub fn requests(&self) -> Vec<TrackingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Tracker for MockTracker {
    async fn track(&self, request: TrackingRequest) -> TrackingReport {
        self.requests.lock().unwrap().push(request.clone());
        let resolution = Resolution::Acquired(AcquisitionResult {
            source_tag: "api".into(),
            raw_text: format!("raw tracking data for {}", request.identifier),
        });
        TrackingReport::new(&request, &resolution, self.record.clone())
    }

    fn browser_enabled(&self) -> bool {
        self.browser
    }
}
