use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::util::truncate_chars;

/// Length of the carrier prefix shared by every split-format site.
pub const PREFIX_LEN: usize = 3;

/// Maximum length of the raw snippet echoed back to callers.
pub const RAW_SNIPPET_CHARS: usize = 200;

/// Transport mode of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Air,
    Sea,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Air => "air",
            Mode::Sea => "sea",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "air" => Ok(Mode::Air),
            "sea" => Ok(Mode::Sea),
            _ => Err(format!("Unknown mode: {s} (expected 'air' or 'sea')")),
        }
    }
}

/// An air waybill or container number.
///
/// Keeps the caller's original spelling next to the normalized form
/// (whitespace and dashes removed) that every routing decision uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    raw: String,
    normalized: String,
}

impl Identifier {
    /// Parse a caller-supplied identifier. Fails if nothing is left after
    /// normalization.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(AppError::Generic(format!(
                "Tracking identifier '{raw}' is empty after normalization"
            )));
        }
        Ok(Self {
            raw: raw.to_string(),
            normalized,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// First [`PREFIX_LEN`] characters (the airline code for waybills).
    pub fn prefix(&self) -> &str {
        &self.normalized[..self.split_at()]
    }

    /// Everything after the prefix.
    pub fn suffix(&self) -> &str {
        &self.normalized[self.split_at()..]
    }

    /// Human-readable `PPP-SSSSSSSS` form for sites that expect the dash.
    pub fn display(&self) -> String {
        if self.suffix().is_empty() {
            self.normalized.clone()
        } else {
            format!("{}-{}", self.prefix(), self.suffix())
        }
    }

    fn split_at(&self) -> usize {
        self.normalized
            .char_indices()
            .nth(PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.normalized.len())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Strip whitespace and dash separators. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// One tracking lookup, immutable for the duration of a resolution.
#[derive(Debug, Clone)]
pub struct TrackingRequest {
    pub identifier: Identifier,
    pub mode: Mode,
    pub carrier_hint: String,
}

impl TrackingRequest {
    pub fn new(
        identifier: &str,
        mode: Mode,
        carrier_hint: impl Into<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            identifier: Identifier::parse(identifier)?,
            mode,
            carrier_hint: carrier_hint.into(),
        })
    }
}

/// Raw data acquired by one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionResult {
    /// `"api"` for the fast path, otherwise the driver name.
    pub source_tag: String,
    pub raw_text: String,
}

/// Outcome of one resolution. Never an unreleased session, never a panic.
#[derive(Debug)]
pub enum Resolution {
    Acquired(AcquisitionResult),
    /// The selected driver returned no text at all.
    NotImplemented { driver: &'static str },
    /// The browser tier failed; `driver` is `"browser"` when the session
    /// itself could not be opened.
    Failed { driver: &'static str, error: AppError },
}

impl Resolution {
    pub fn source_tag(&self) -> &str {
        match self {
            Resolution::Acquired(result) => &result.source_tag,
            Resolution::NotImplemented { driver } | Resolution::Failed { driver, .. } => driver,
        }
    }

    /// Text surfaced to callers; failures render as fixed messages.
    pub fn raw_text(&self) -> String {
        match self {
            Resolution::Acquired(result) => result.raw_text.clone(),
            Resolution::NotImplemented { .. } => "Driver Not Implemented.".to_string(),
            Resolution::Failed { error, .. } => format!("Error: {error}"),
        }
    }

    pub fn is_acquired(&self) -> bool {
        matches!(self, Resolution::Acquired(_))
    }
}

/// Structured status produced by the interpretation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRecord {
    pub latest_date: String,
    pub status: String,
    pub summary: String,
}

impl StatusRecord {
    pub fn new(
        latest_date: impl Into<String>,
        status: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            latest_date: latest_date.into(),
            status: status.into(),
            summary: summary.into(),
        }
    }

    /// Returned without consulting the model when the input is too short.
    pub fn insufficient() -> Self {
        Self::new("N/A", "Error", "Insufficient data.")
    }

    /// Returned when the model answer could not be used.
    pub fn parse_failed() -> Self {
        Self::new("Error", "AI Parse Failed", "Error analyzing data.")
    }
}

/// Final answer handed back to the HTTP or CLI surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingReport {
    /// Identifier exactly as the caller supplied it.
    pub identifier: String,
    pub carrier_hint: String,
    pub mode: Mode,
    pub source_tag: String,
    pub status: String,
    pub eta_or_latest_date: String,
    pub summary: String,
    pub raw_snippet: String,
}

impl TrackingReport {
    pub fn new(request: &TrackingRequest, resolution: &Resolution, record: StatusRecord) -> Self {
        Self {
            identifier: request.identifier.raw().to_string(),
            carrier_hint: request.carrier_hint.clone(),
            mode: request.mode,
            source_tag: resolution.source_tag().to_string(),
            status: record.status,
            eta_or_latest_date: record.latest_date,
            summary: record.summary,
            raw_snippet: truncate_chars(&resolution.raw_text(), RAW_SNIPPET_CHARS).to_string(),
        }
    }
}
