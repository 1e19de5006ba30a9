use serde::{Deserialize, Serialize};

use trackline_core::{Mode, TrackingReport, TrackingRequest};

use crate::error::ApiError;

/// Largest accepted batch.
pub const MAX_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

fn default_type() -> String {
    "air".to_string()
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct TrackRequest {
    /// Air waybill or container number, in any spacing.
    pub tracking_number: String,
    /// Free-form carrier name; used to route sea shipments.
    #[serde(default)]
    pub carrier: String,
    /// `"air"` or `"sea"`.
    #[serde(default = "default_type", rename = "type")]
    #[schema(example = "air")]
    pub shipment_type: String,
}

impl TrackRequest {
    pub fn into_request(self) -> Result<TrackingRequest, ApiError> {
        if self.tracking_number.trim().is_empty() {
            return Err(ApiError::Validation("tracking_number must not be empty".into()));
        }
        let mode: Mode = self.shipment_type.parse().map_err(ApiError::Validation)?;
        TrackingRequest::new(&self.tracking_number, mode, self.carrier)
            .map_err(|e| ApiError::Validation(e.to_string()))
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrackResponse {
    pub tracking_number: String,
    pub carrier: String,
    pub status: String,
    pub live_eta: String,
    pub smart_summary: String,
    /// First 200 characters of the raw data the status was derived from.
    pub raw_data_snippet: String,
}

impl From<TrackingReport> for TrackResponse {
    fn from(report: TrackingReport) -> Self {
        Self {
            tracking_number: report.identifier,
            carrier: report.carrier_hint,
            status: report.status,
            live_eta: report.eta_or_latest_date,
            smart_summary: report.summary,
            raw_data_snippet: report.raw_snippet,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BatchRequest {
    pub shipments: Vec<TrackRequest>,
}

impl BatchRequest {
    /// Validate every item up front; one bad item rejects the batch.
    pub fn into_requests(self) -> Result<Vec<TrackingRequest>, ApiError> {
        let count = self.shipments.len();
        if count == 0 || count > MAX_BATCH_SIZE {
            return Err(ApiError::Validation(format!(
                "shipments must contain between 1 and {MAX_BATCH_SIZE} items, got {count}"
            )));
        }

        self.shipments
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                item.into_request().map_err(|e| {
                    ApiError::Validation(format!("shipments[{i}]: {e}"))
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchResponse {
    /// One result per submitted shipment, in submission order.
    pub results: Vec<TrackResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `"enabled"` when carrier websites can be visited.
    pub browser: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(number: &str, kind: &str) -> TrackRequest {
        TrackRequest {
            tracking_number: number.into(),
            carrier: String::new(),
            shipment_type: kind.into(),
        }
    }

    #[test]
    fn test_type_defaults_to_air() {
        let body: TrackRequest = serde_json::from_str(r#"{"tracking_number": "098-12345678"}"#).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.mode, Mode::Air);
        assert_eq!(request.carrier_hint, "");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(matches!(
            item("MSCU1234567", "rail").into_request(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_number_is_rejected() {
        assert!(item(" - ", "sea").into_request().is_err());
    }

    #[test]
    fn test_batch_bounds() {
        let empty = BatchRequest { shipments: vec![] };
        assert!(empty.into_requests().is_err());

        let too_many = BatchRequest {
            shipments: vec![item("MSCU1234567", "sea"); MAX_BATCH_SIZE + 1],
        };
        assert!(too_many.into_requests().is_err());
    }

    #[test]
    fn test_batch_error_names_the_item() {
        let batch = BatchRequest {
            shipments: vec![item("MSCU1234567", "sea"), item("", "air")],
        };
        let err = batch.into_requests().unwrap_err();
        assert!(err.to_string().starts_with("shipments[1]:"));
    }
}
