//! CSV manifest tracking.
//!
//! A manifest is a spreadsheet export with one shipment per row. Columns are
//! found by header name; exports without a header row use the fixed layout
//! `Container, Vessel, Carrier, ETD, ETA, Destination, ATA`.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use trackline_core::{Mode, TrackingRequest, Tracker};

/// Column layout of a manifest exported without a header row.
const POSITIONAL_HEADERS: [&str; 7] = [
    "Container",
    "Vessel",
    "Carrier",
    "ETD",
    "ETA",
    "Destination",
    "ATA",
];
const MIN_HEADERLESS_COLUMNS: usize = 3;
const MIN_HEADERLESS_IDENTIFIER_LEN: usize = 10;
/// Digits after the airline prefix of an air waybill (`176-12345678`).
const AWB_SERIAL_LEN: usize = 8;
const UNKNOWN_CARRIER: &str = "Unknown";
const MISSING_ETA: &str = "N/A";

/// One shipment read from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub identifier: String,
    pub carrier: String,
    pub mode: Mode,
    /// ETA recorded in the manifest, `N/A` when absent.
    pub system_eta: String,
}

/// One output row: the manifest entry next to what tracking found.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    #[serde(rename = "Tracking Number")]
    pub identifier: String,
    #[serde(rename = "Carrier")]
    pub carrier: String,
    #[serde(rename = "Mode")]
    pub mode: Mode,
    #[serde(rename = "System ETA")]
    pub system_eta: String,
    #[serde(rename = "Live Status")]
    pub status: String,
    #[serde(rename = "Live ETA")]
    pub live_eta: String,
    #[serde(rename = "Smart Summary")]
    pub summary: String,
    #[serde(rename = "ETA Changed?")]
    pub eta_changed: &'static str,
}

#[derive(Debug, Default)]
struct Columns {
    identifier: Option<usize>,
    carrier: Option<usize>,
    eta: Option<usize>,
}

impl Columns {
    fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut columns = Columns::default();
        for (index, header) in headers.into_iter().enumerate() {
            let lower = header.trim().to_lowercase();
            let slot = if ["container", "awb", "tracking"]
                .iter()
                .any(|k| lower.contains(k))
            {
                &mut columns.identifier
            } else if ["carrier", "shipping line", "airline"]
                .iter()
                .any(|k| lower.contains(k))
            {
                &mut columns.carrier
            } else if lower.contains("eta") || lower.contains("arrival") {
                &mut columns.eta
            } else {
                continue;
            };
            slot.get_or_insert(index);
        }
        columns
    }

    fn positional() -> Self {
        Self::from_headers(POSITIONAL_HEADERS)
    }
}

/// Whether a first record without recognizable headers is itself data.
fn looks_headerless(first: &csv::StringRecord) -> bool {
    first.len() >= MIN_HEADERLESS_COLUMNS
        && first
            .get(0)
            .is_some_and(|cell| cell.trim().chars().count() >= MIN_HEADERLESS_IDENTIFIER_LEN)
}

/// Map free-form carrier names onto the names drivers are routed by.
pub fn normalize_carrier(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_CARRIER.to_string();
    }
    let lower = trimmed.to_lowercase();
    let canonical = if lower.contains("hapag") {
        "HAPAG-LLOYD"
    } else if lower.contains("cma") {
        "CMA CGM"
    } else if lower.contains("one") {
        "Ocean Network Express"
    } else if lower.contains("msc") {
        "MSC"
    } else {
        return trimmed.to_string();
    };
    canonical.to_string()
}

/// Air waybills look like `176-12345678`; everything else is treated as sea.
pub fn guess_mode(identifier: &str) -> Mode {
    match identifier.split('-').nth(1) {
        Some(serial) if serial.chars().count() == AWB_SERIAL_LEN => Mode::Air,
        _ => Mode::Sea,
    }
}

/// Parse a manifest, skipping rows without a usable identifier.
pub fn read_manifest(reader: impl Read) -> Result<Vec<ManifestRow>> {
    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records();

    let Some(first) = records.next().transpose().context("Failed to read manifest")? else {
        return Ok(Vec::new());
    };

    let named = Columns::from_headers(first.iter());
    let (columns, pending) = if named.identifier.is_some() {
        (named, None)
    } else if looks_headerless(&first) {
        tracing::debug!("Manifest has no header row; using positional columns");
        (Columns::positional(), Some(first))
    } else {
        tracing::warn!("No tracking number column found; falling back to positional columns");
        (Columns::positional(), None)
    };

    let cell = |record: &csv::StringRecord, column: Option<usize>| {
        column
            .and_then(|i| record.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    for (line, record) in pending.into_iter().map(Ok).chain(records).enumerate() {
        let record = record.with_context(|| format!("Failed to read manifest row {}", line + 1))?;
        let identifier = cell(&record, columns.identifier);
        if identifier.is_empty() || identifier.eq_ignore_ascii_case("unknown") {
            continue;
        }
        let system_eta = cell(&record, columns.eta);
        rows.push(ManifestRow {
            mode: guess_mode(&identifier),
            carrier: normalize_carrier(&cell(&record, columns.carrier)),
            system_eta: if system_eta.is_empty() {
                MISSING_ETA.to_string()
            } else {
                system_eta
            },
            identifier,
        });
    }
    Ok(rows)
}

pub fn read_manifest_file(path: &Path) -> Result<Vec<ManifestRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open manifest {}", path.display()))?;
    read_manifest(file)
}

/// Track every row, one at a time, in manifest order.
pub async fn track_all<T: Tracker>(tracker: &T, rows: Vec<ManifestRow>) -> Vec<BatchOutcome> {
    let total = rows.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, row) in rows.into_iter().enumerate() {
        tracing::info!(
            row = index + 1,
            total,
            identifier = %row.identifier,
            carrier = %row.carrier,
            "Tracking manifest row"
        );

        let (status, live_eta, summary) =
            match TrackingRequest::new(&row.identifier, row.mode, row.carrier.clone()) {
                Ok(request) => {
                    let report = tracker.track(request).await;
                    (report.status, report.eta_or_latest_date, report.summary)
                }
                Err(e) => {
                    tracing::warn!(identifier = %row.identifier, error = %e, "Skipping row");
                    ("Error".to_string(), String::new(), e.to_string())
                }
            };

        outcomes.push(BatchOutcome {
            eta_changed: if row.system_eta == live_eta { "NO" } else { "YES" },
            identifier: row.identifier,
            carrier: row.carrier,
            mode: row.mode,
            system_eta: row.system_eta,
            status,
            live_eta,
            summary,
        });
    }

    outcomes
}

pub fn write_outcomes(writer: impl Write, outcomes: &[BatchOutcome]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        out.serialize(outcome).context("Failed to write result row")?;
    }
    out.flush().context("Failed to flush results")?;
    Ok(())
}
