//! Raw tracking text to [`StatusRecord`].
//!
//! The model only sees bounded, cleaned text plus today's date; every
//! failure on the way (short input, model error, malformed answer) collapses
//! into one of the fixed degraded records.

use chrono::{Local, NaiveDate};

use crate::error::AppError;
use crate::models::{Resolution, StatusRecord};
use crate::traits::{Cleaner, StatusModel};
use crate::util::{looks_like_markup, truncate_chars};

/// Inputs shorter than this (after trimming) never reach the model.
pub const MIN_INPUT_CHARS: usize = 50;

/// Character budget of the raw text placed in the prompt.
pub const MAX_PROMPT_CHARS: usize = 3500;

/// Status values the model is asked to choose from.
pub const STATUS_VOCABULARY: &[&str] = &[
    "Delivered",
    "Arrived at Destination",
    "In Transit",
    "Booked",
    "Exception",
];

/// Date format used both for the injected "today" and in the answer.
pub const DATE_FORMAT: &str = "%d-%b-%Y";

/// Build the system prompt for `today`.
pub fn system_prompt(today: NaiveDate) -> String {
    let today = today.format(DATE_FORMAT);
    format!(
        r#"You are a logistics tracking analyst. Today's date is {today}.

Read the raw tracking data and return a JSON object with exactly these keys:
  "latest_date": the predicted arrival date, or the date of the most recent event, formatted DD-Mon-YYYY (e.g. {today}); "N/A" if none is present.
  "status": one of {vocabulary}. You may append a short qualifier in parentheses.
  "summary": one or two sentences describing where the shipment is and what happened last.

Rules:
1. A predicted arrival date after today means "In Transit".
2. A predicted arrival date more than 2 days before today, with no delivery event, means "Arrived at Destination (Delayed update)".
3. An explicit delivered or proof-of-delivery event always wins: use "Delivered".
4. If the most recent event is more than 7 days before today and there is no delivery event, use "Delivered (Likely, Stale data)".
5. If the data contains a CO2 or emissions figure, include it in the summary with its unit.
6. Return only the JSON object, no other keys and no commentary."#,
        vocabulary = STATUS_VOCABULARY
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// User prompt carrying the carrier label and the bounded raw text.
pub fn user_prompt(carrier: &str, raw: &str) -> String {
    format!("Carrier: {carrier}\n\nRaw Data:\n{raw}")
}

#[derive(Clone)]
pub struct StatusInterpreter<M: StatusModel, C: Cleaner> {
    model: M,
    cleaner: C,
}

impl<M: StatusModel, C: Cleaner> StatusInterpreter<M, C> {
    pub fn new(model: M, cleaner: C) -> Self {
        Self { model, cleaner }
    }

    /// Interpret `raw` against the local calendar date.
    pub async fn interpret(&self, raw: &str, carrier: &str) -> StatusRecord {
        self.interpret_on(raw, carrier, Local::now().date_naive()).await
    }

    /// Interpret `raw` as if today were `today`.
    pub async fn interpret_on(&self, raw: &str, carrier: &str, today: NaiveDate) -> StatusRecord {
        let chars = raw.trim().chars().count();
        if chars < MIN_INPUT_CHARS {
            tracing::info!(chars, "Raw data too short, skipping interpretation");
            return StatusRecord::insufficient();
        }

        let text = if looks_like_markup(raw) {
            match self.cleaner.clean(raw) {
                Ok(markdown) => markdown,
                Err(e) => {
                    tracing::warn!(error = %e, "Markup cleaning failed, prompting with raw markup");
                    raw.to_string()
                }
            }
        } else {
            raw.to_string()
        };
        let bounded = truncate_chars(&text, MAX_PROMPT_CHARS);

        let system = system_prompt(today);
        let user = user_prompt(carrier, bounded);
        let answer = match self.model.complete_json(&system, &user).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(kind = e.kind(), error = %e, "Model call failed, retrying once");
                self.model.complete_json(&system, &user).await
            }
            other => other,
        }
        .and_then(parse_record);

        match answer {
            Ok(record) => {
                tracing::info!(status = %record.status, "Interpreted tracking data");
                record
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Interpretation failed");
                StatusRecord::parse_failed()
            }
        }
    }

    /// Status for a whole resolution. Failed and empty resolutions are
    /// reported directly from their failure text; the model is not called.
    pub async fn interpret_resolution(&self, resolution: &Resolution, carrier: &str) -> StatusRecord {
        match resolution {
            Resolution::Acquired(result) => self.interpret(&result.raw_text, carrier).await,
            Resolution::NotImplemented { .. } => {
                StatusRecord::new("N/A", "Not Implemented", resolution.raw_text())
            }
            Resolution::Failed { .. } => StatusRecord::new("N/A", "Error", resolution.raw_text()),
        }
    }
}

/// Accept only an object with exactly the three string fields.
fn parse_record(value: serde_json::Value) -> Result<StatusRecord, AppError> {
    if !value.is_object() {
        return Err(AppError::InterpretationFailure(format!(
            "expected a JSON object, got {value}"
        )));
    }
    serde_json::from_value(value).map_err(|e| AppError::InterpretationFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AcquisitionResult;
    use crate::testutil::{MockCleaner, MockStatusModel};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn long_text() -> String {
        "AWB 098-12345678 BOM LHR DEP 17 Oct 2026 ETA 21 Oct 2026 Flight AI131 4 pcs".to_string()
    }

    fn answer() -> serde_json::Value {
        json!({"latest_date": "21-Oct-2026", "status": "In Transit", "summary": "Departed BOM."})
    }

    #[tokio::test]
    async fn short_input_skips_the_model() {
        let model = MockStatusModel::new(vec![Ok(answer())]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let record = interpreter.interpret_on(&"x".repeat(30), "Air India", today()).await;

        assert_eq!(record, StatusRecord::new("N/A", "Error", "Insufficient data."));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn whitespace_padding_does_not_count() {
        let model = MockStatusModel::new(vec![]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());
        let padded = format!("{:^80}", "DELIVERED");

        let record = interpreter.interpret_on(&padded, "", today()).await;
        assert_eq!(record, StatusRecord::insufficient());
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn valid_answer_is_returned() {
        let model = MockStatusModel::new(vec![Ok(answer())]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let record = interpreter.interpret_on(&long_text(), "Air India", today()).await;

        assert_eq!(record.status, "In Transit");
        assert_eq!(record.latest_date, "21-Oct-2026");
        let calls = model.calls();
        assert!(calls[0].0.contains("Today's date is 19-Oct-2026"));
        assert!(calls[0].1.starts_with("Carrier: Air India\n\nRaw Data:\nAWB 098"));
    }

    #[tokio::test]
    async fn prompt_text_is_bounded() {
        let model = MockStatusModel::new(vec![Ok(answer())]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        interpreter.interpret_on(&"é".repeat(10_000), "X", today()).await;

        let user = &model.calls()[0].1;
        let body = user.trim_start_matches("Carrier: X\n\nRaw Data:\n");
        assert_eq!(body.chars().count(), MAX_PROMPT_CHARS);
    }

    #[tokio::test]
    async fn markup_is_cleaned_first() {
        let model = MockStatusModel::new(vec![Ok(answer())]);
        let cleaner = MockCleaner::new();
        let interpreter = StatusInterpreter::new(model.clone(), cleaner.clone());
        let html = format!("<html><body><p>{}</p></body></html>", long_text());

        interpreter.interpret_on(&html, "X", today()).await;

        assert_eq!(cleaner.calls(), 1);
        assert!(!model.calls()[0].1.contains("<p>"));
    }

    #[tokio::test]
    async fn extra_or_missing_fields_fail_parsing() {
        for bad in [
            json!({"latest_date": "N/A", "status": "Booked"}),
            json!({"latest_date": "N/A", "status": "Booked", "summary": "x", "eta": "y"}),
            json!({"latest_date": 5, "status": "Booked", "summary": "x"}),
            json!(["not", "an", "object"]),
        ] {
            let interpreter =
                StatusInterpreter::new(MockStatusModel::new(vec![Ok(bad)]), MockCleaner::new());
            let record = interpreter.interpret_on(&long_text(), "X", today()).await;
            assert_eq!(record, StatusRecord::parse_failed());
        }
    }

    #[tokio::test]
    async fn non_object_answers_fail_parsing() {
        for bad in [json!(["21-Oct-2026", "In Transit", "Departed."]), json!("In Transit"), json!(null)] {
            let model = MockStatusModel::new(vec![Ok(bad)]);
            let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());
            let record = interpreter.interpret_on(&long_text(), "X", today()).await;
            assert_eq!(record, StatusRecord::parse_failed());
            assert_eq!(model.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn model_error_degrades() {
        let model = MockStatusModel::new(vec![
            Err(AppError::RateLimitExceeded),
            Err(AppError::RateLimitExceeded),
        ]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let record = interpreter.interpret_on(&long_text(), "X", today()).await;
        assert_eq!(
            record,
            StatusRecord::new("Error", "AI Parse Failed", "Error analyzing data.")
        );
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn transient_model_error_is_retried_once() {
        let model = MockStatusModel::new(vec![Err(AppError::Timeout(120)), Ok(answer())]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let record = interpreter.interpret_on(&long_text(), "X", today()).await;

        assert_eq!(record.status, "In Transit");
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn permanent_model_error_is_not_retried() {
        let model = MockStatusModel::new(vec![
            Err(AppError::LlmError {
                message: "bad key".into(),
                status_code: 401,
                retryable: false,
            }),
            Ok(answer()),
        ]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let record = interpreter.interpret_on(&long_text(), "X", today()).await;

        assert_eq!(record, StatusRecord::parse_failed());
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_resolutions_skip_the_model() {
        let model = MockStatusModel::new(vec![]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());

        let failed = Resolution::Failed {
            driver: "china_airlines",
            error: AppError::ChallengeExhausted { attempts: 2 },
        };
        let record = interpreter.interpret_resolution(&failed, "China Airlines").await;
        assert_eq!(record.status, "Error");
        assert_eq!(record.summary, "Error: Challenge not solved after 2 attempts");

        let missing = Resolution::NotImplemented { driver: "cma_cgm" };
        let record = interpreter.interpret_resolution(&missing, "CMA CGM").await;
        assert_eq!(record.status, "Not Implemented");

        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn acquired_resolution_is_interpreted() {
        let model = MockStatusModel::new(vec![Ok(answer())]);
        let interpreter = StatusInterpreter::new(model.clone(), MockCleaner::new());
        let resolution = Resolution::Acquired(AcquisitionResult {
            source_tag: "api".into(),
            raw_text: long_text(),
        });

        let record = interpreter.interpret_resolution(&resolution, "Air India").await;
        assert_eq!(record.status, "In Transit");
        assert_eq!(model.calls().len(), 1);
    }

    #[test]
    fn system_prompt_carries_every_rule() {
        let prompt = system_prompt(today());
        assert!(prompt.contains("19-Oct-2026"));
        assert!(prompt.contains("\"Arrived at Destination\""));
        assert!(prompt.contains("more than 2 days"));
        assert!(prompt.contains("more than 7 days"));
        assert!(prompt.contains("CO2"));
        assert!(prompt.contains("always wins"));
    }
}
