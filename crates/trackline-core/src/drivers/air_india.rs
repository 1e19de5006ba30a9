use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::{dismiss_consent, human_type};
use crate::extract::{ExtractPolicy, WaitStep, extract, require_marker, settle};
use crate::models::Identifier;

const NAME: &str = "air_india";
const ENTRY_URL: &str = "https://cargo.airindia.com/in/en/track-shipment.html";

const PREFIX_INPUT: Locator = Locator::Css("input[formcontrolname='airlineCode']");
const SUFFIX_INPUT: Locator = Locator::Css("input[formcontrolname='airwayBillNumber']");
const TRACK_BUTTON: Locator = Locator::Css("button[title='Track Shipment']");

/// Visible only once the results table has rendered.
const RESULT_HEADING: Locator = Locator::Text("SHIPMENT DETAILS");
const RESULT_MARKERS: &[&str] = &["SHIPMENT DETAILS", "Origin"];

/// Air India Cargo (prefix 098). Split prefix/suffix form.
#[derive(Debug, Default, Clone, Copy)]
pub struct AirIndia;

#[async_trait]
impl Driver for AirIndia {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, prefix = identifier.prefix(), suffix = identifier.suffix(), "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        dismiss_consent(page).await;

        require_visible(NAME, page, PREFIX_INPUT, INPUT_TIMEOUT).await?;
        human_type(page, &PREFIX_INPUT, identifier.prefix()).await?;
        human_type(page, &SUFFIX_INPUT, identifier.suffix()).await?;
        page.click(&TRACK_BUTTON).await?;

        settle(
            page,
            &[
                WaitStep::Element(RESULT_HEADING, Duration::from_secs(20)),
                WaitStep::NetworkIdle(Duration::from_secs(5)),
            ],
        )
        .await;

        let extraction = extract(NAME, page, None, &ExtractPolicy::default()).await?;
        // The form page itself carries no result labels.
        require_marker(NAME, &extraction.text, RESULT_MARKERS)?;
        Ok(extraction.text)
    }
}
