use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::{dismiss_consent, human_type, submit};
use crate::extract::{ExtractPolicy, WaitStep, extract, require_marker, settle};
use crate::models::Identifier;

const NAME: &str = "cma_cgm";
const ENTRY_URL: &str = "https://www.cma-cgm.com/ebusiness/tracking/search";

const INPUT: Locator = Locator::Css("#Reference");
const SEARCH_BUTTON: Locator = Locator::Css("#btnTracking");
const RESULT_TIMELINE: Locator = Locator::Css(".o-trackingnomap, .timeline--item");
const RESULT_MARKERS: &[&str] = &["Discharged", "Loaded", "Gate in", "Gate out", "Vessel", "ETA"];

/// CMA CGM. Single reference field search.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmaCgm;

#[async_trait]
impl Driver for CmaCgm {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, identifier = %identifier, "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        dismiss_consent(page).await;

        require_visible(NAME, page, INPUT, INPUT_TIMEOUT).await?;
        human_type(page, &INPUT, identifier.normalized()).await?;
        submit(page, &SEARCH_BUTTON, &INPUT).await?;

        settle(
            page,
            &[
                WaitStep::Element(RESULT_TIMELINE, Duration::from_secs(30)),
                WaitStep::NetworkIdle(Duration::from_secs(10)),
                WaitStep::Delay(Duration::from_secs(5)),
            ],
        )
        .await;

        let extraction = extract(NAME, page, None, &ExtractPolicy::default()).await?;
        require_marker(NAME, &extraction.text, RESULT_MARKERS)?;
        Ok(extraction.text)
    }
}
