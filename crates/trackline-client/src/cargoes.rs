//! Cargoes Flow public tracking API, the fast path queried before any
//! browser session is opened.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value, json};
use trackline_core::error::AppError;
use trackline_core::models::{Identifier, Mode};
use trackline_core::traits::{FastPath, FastPathOutcome, MissReason};

use crate::llm::http_client;

pub const DEFAULT_ENDPOINT: &str =
    "https://connect.cargoes.com/flow/api/public_tracking/v1/shipments";
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const RESULT_LIMIT: &str = "50";

/// Candidate keys for each summary field, most specific first.
const SUMMARY_FIELDS: &[(&str, &[&str])] = &[
    ("carrierStatus", &["carrierStatus", "shipmentStatus", "status"]),
    ("subStatus", &["subStatus", "shipmentSubStatus", "subStatus1"]),
    ("origin", &["shipmentOrigin", "originPort", "portOfLoading", "origin"]),
    (
        "destination",
        &["shipmentDestination", "destinationPort", "portOfDischarge", "destination"],
    ),
    (
        "predictedArrival",
        &["predictedArrival", "promisedEta", "estimatedArrival", "eta"],
    ),
    ("emissions", &["co2Emission", "emissions", "totalEmissions", "co2"]),
];

#[derive(Clone)]
struct Credentials {
    api_key: String,
    org_token: String,
}

#[derive(Clone)]
pub struct CargoesFlowClient {
    client: Client,
    endpoint: String,
    credentials: Option<Credentials>,
}

impl CargoesFlowClient {
    /// Build a client. Blank credentials (after trimming) leave the fast path
    /// disabled: every query is then a [`MissReason::NotConfigured`] miss.
    pub fn new(api_key: &str, org_token: &str) -> Result<Self, AppError> {
        let api_key = api_key.trim();
        let org_token = org_token.trim();
        let credentials = (!api_key.is_empty() && !org_token.is_empty()).then(|| Credentials {
            api_key: api_key.to_string(),
            org_token: org_token.to_string(),
        });

        Ok(Self {
            client: http_client(DEFAULT_API_TIMEOUT)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AppError> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Query parameters for one identifier.
fn query_params(identifier: &Identifier, mode: Mode) -> Vec<(&'static str, String)> {
    let number = identifier.normalized().to_string();
    match mode {
        Mode::Sea => vec![
            ("shipmentType", "INTERMODAL_SHIPMENT".to_string()),
            ("containerNumber", number),
            ("includeUniqueContainers", "true".to_string()),
            ("_limit", RESULT_LIMIT.to_string()),
        ],
        Mode::Air => vec![
            ("shipmentType", "AIR_SHIPMENT".to_string()),
            ("awbNumber", number),
            ("_limit", RESULT_LIMIT.to_string()),
        ],
    }
}

/// Turn an HTTP status and body into a fast-path outcome.
pub fn classify(status: u16, body: &str) -> FastPathOutcome {
    match status {
        200 => match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(shipments)) if shipments.is_empty() => {
                FastPathOutcome::Miss(MissReason::EmptyList)
            }
            Ok(Value::Array(shipments)) => FastPathOutcome::Found(snippet(shipments)),
            Ok(other) => FastPathOutcome::Miss(MissReason::InvalidBody(format!(
                "expected a list, got {}",
                json_kind(&other)
            ))),
            Err(e) => FastPathOutcome::Miss(MissReason::InvalidBody(e.to_string())),
        },
        401 => FastPathOutcome::Miss(MissReason::AuthFailure),
        404 => FastPathOutcome::Miss(MissReason::NotFound),
        other => FastPathOutcome::Miss(MissReason::UnexpectedStatus(other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Pretty JSON with the salient fields of the first shipment up front and
/// the complete list after them.
fn snippet(shipments: Vec<Value>) -> String {
    let mut summary = Map::new();
    if let Some(Value::Object(first)) = shipments.first() {
        for (field, candidates) in SUMMARY_FIELDS {
            let found = candidates
                .iter()
                .filter_map(|key| first.get(*key))
                .find(|v| !v.is_null() && v.as_str() != Some(""));
            if let Some(value) = found {
                summary.insert((*field).to_string(), value.clone());
            }
        }
    }

    let document = json!({ "summary": summary, "shipments": shipments });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
}

impl FastPath for CargoesFlowClient {
    async fn query(&self, identifier: &Identifier, mode: Mode) -> FastPathOutcome {
        let Some(credentials) = &self.credentials else {
            tracing::warn!("Cargoes Flow credentials missing, skipping fast path");
            return FastPathOutcome::Miss(MissReason::NotConfigured);
        };

        tracing::info!(identifier = %identifier, %mode, "Checking Cargoes Flow");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query_params(identifier, mode))
            .header("X-DPW-ApiKey", &credentials.api_key)
            .header("X-DPW-Org-Token", &credentials.org_token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "Cargoes Flow connection failed");
                return FastPathOutcome::Miss(MissReason::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return FastPathOutcome::Miss(MissReason::Transport(e.to_string())),
        };

        let outcome = classify(status, &body);
        match &outcome {
            FastPathOutcome::Found(_) => {
                tracing::info!(identifier = %identifier, "Cargoes Flow returned data")
            }
            FastPathOutcome::Miss(MissReason::AuthFailure) => {
                tracing::warn!(identifier = %identifier, "Cargoes Flow rejected credentials (401)")
            }
            FastPathOutcome::Miss(MissReason::UnexpectedStatus(code)) => {
                tracing::warn!(identifier = %identifier, status = code, body = %body, "Cargoes Flow error")
            }
            FastPathOutcome::Miss(reason) => {
                tracing::info!(identifier = %identifier, %reason, "Cargoes Flow has no data")
            }
        }
        outcome
    }
}
