use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::{SubmitOutcome, VALIDATION_SETTLE, dismiss_consent, human_type, submit};
use crate::extract::{ExtractPolicy, WaitStep, extract, require_marker, settle};
use crate::models::Identifier;

const NAME: &str = "af_klm";
const ENTRY_URL: &str = "https://www.afklcargo.com/mycargo/shipment/singlesearch";

const INPUT: Locator = Locator::Css("textarea[formcontrolname='track']");
const SUBMIT: Locator = Locator::Css("button[type='submit']");
const RESULT_CARD: Locator = Locator::Css("afkl-shipment-details, .shipment-status");
const RESULT_MARKERS: &[&str] = &["Status", "Origin", "Destination", "Pieces"];

/// Air France KLM Cargo (prefixes 057 and 074).
///
/// The search button stays disabled until the form's own validation has
/// seen the input.
#[derive(Debug, Default, Clone, Copy)]
pub struct AfKlm;

#[async_trait]
impl Driver for AfKlm {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, identifier = %identifier, "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        dismiss_consent(page).await;

        require_visible(NAME, page, INPUT, INPUT_TIMEOUT).await?;
        human_type(page, &INPUT, identifier.normalized()).await?;
        tokio::time::sleep(VALIDATION_SETTLE).await;

        if submit(page, &SUBMIT, &INPUT).await? == SubmitOutcome::ClickedAfterValidation {
            tracing::info!(driver = NAME, "Submitted after validation trigger");
        }

        settle(page, &[WaitStep::NetworkIdle(Duration::from_secs(30))]).await;
        settle(page, &[WaitStep::Element(RESULT_CARD, Duration::from_secs(20))]).await;

        let extraction = extract(NAME, page, None, &ExtractPolicy::default()).await?;
        require_marker(NAME, &extraction.text, RESULT_MARKERS)?;
        Ok(extraction.text)
    }
}
