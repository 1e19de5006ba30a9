use std::fmt;
use std::future::Future;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Identifier, Mode, TrackingReport, TrackingRequest};

/// Why the fast path produced nothing. None of these abort a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// Credentials are not configured; the tier is skipped.
    NotConfigured,
    /// HTTP 200 with an empty result list.
    EmptyList,
    /// HTTP 404.
    NotFound,
    /// HTTP 401. Logged distinctly, still a miss for the caller.
    AuthFailure,
    /// Any other non-200 status.
    UnexpectedStatus(u16),
    /// Connection failure or timeout.
    Transport(String),
    /// HTTP 200 whose body is not the expected JSON shape.
    InvalidBody(String),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::NotConfigured => write!(f, "credentials not configured"),
            MissReason::EmptyList => write!(f, "empty result list"),
            MissReason::NotFound => write!(f, "shipment not found"),
            MissReason::AuthFailure => write!(f, "authentication failed (401)"),
            MissReason::UnexpectedStatus(code) => write!(f, "unexpected HTTP {code}"),
            MissReason::Transport(msg) => write!(f, "transport failure: {msg}"),
            MissReason::InvalidBody(msg) => write!(f, "invalid body: {msg}"),
        }
    }
}

/// Every fast-path answer collapses into one of these two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastPathOutcome {
    Found(String),
    Miss(MissReason),
}

/// Hosted aggregation API queried before any browser is started.
///
/// Implementations never fail: transport and HTTP problems are misses.
pub trait FastPath: Send + Sync + Clone {
    fn query(
        &self,
        identifier: &Identifier,
        mode: Mode,
    ) -> impl Future<Output = FastPathOutcome> + Send;
}

/// Chat model that answers with a single JSON object.
pub trait StatusModel: Send + Sync + Clone {
    /// Sends a system + user prompt pair and returns the parsed JSON answer.
    fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Converts raw HTML into clean Markdown text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Vision-capable classifier that reads the text depicted in a challenge
/// image. Object-safe so drivers can hold it behind an `Arc`.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Returns `Ok(None)` when the classifier produced no usable answer.
    async fn solve(&self, png: &[u8]) -> Result<Option<String>, AppError>;
}

/// Full tracking pipeline as seen by the HTTP and CLI surfaces.
pub trait Tracker: Send + Sync + Clone + 'static {
    fn track(&self, request: TrackingRequest) -> impl Future<Output = TrackingReport> + Send;

    /// Whether the browser tier can be used at all.
    fn browser_enabled(&self) -> bool {
        true
    }
}
