use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, NAVIGATION_TIMEOUT};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::{dismiss_banners, dismiss_consent};
use crate::extract::{ExtractPolicy, WaitStep, extract, require_marker, settle};
use crate::models::Identifier;

const NAME: &str = "hapag_lloyd";
const TRACKING_URL: &str =
    "https://www.hapag-lloyd.com/en/online-business/track/track-by-container-solution.html";

const SITE_CONSENT: &[Locator] = &[Locator::Css("#accept-recommended-btn-handler")];
const RESULT_TABLE: Locator = Locator::Css("table.hl-table, .hal-table");
const RESULT_MARKERS: &[&str] = &["Vessel departure", "Vessel arrival", "Gate in", "Gate out", "Discharge", "Loaded"];

/// Hapag-Lloyd. The container is passed in the results URL, so there is
/// no form to fill.
#[derive(Debug, Default, Clone, Copy)]
pub struct HapagLloyd;

fn results_url(identifier: &Identifier) -> String {
    format!("{TRACKING_URL}?container={}", identifier.normalized())
}

#[async_trait]
impl Driver for HapagLloyd {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, identifier = %identifier, "Tracking");
        page.goto(&results_url(identifier), NAVIGATION_TIMEOUT).await?;
        if dismiss_banners(page, SITE_CONSENT).await.is_none() {
            dismiss_consent(page).await;
        }

        settle(
            page,
            &[
                WaitStep::Element(RESULT_TABLE, Duration::from_secs(30)),
                WaitStep::NetworkIdle(Duration::from_secs(10)),
            ],
        )
        .await;

        let extraction = extract(NAME, page, None, &ExtractPolicy::default()).await?;
        require_marker(NAME, &extraction.text, RESULT_MARKERS)?;
        Ok(extraction.text)
    }
}
