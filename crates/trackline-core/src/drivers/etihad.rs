use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::human_type;
use crate::extract::{ExtractPolicy, WaitStep, extract, require_marker, settle};
use crate::models::Identifier;

const NAME: &str = "etihad";
const ENTRY_URL: &str = "https://parcelsapp.com/en/carriers/ethihad-airways-cargo";

const INPUT: Locator = Locator::Css("input.form-control");
const TRACK_BUTTON: Locator = Locator::Css("button.btn-parcels");
/// Result list, tracking panel, or the aggregator's "not found" alert.
const RESULT_PANEL: Locator = Locator::Css(".states, .tracking-info, .alert-danger");
/// Event words of the aggregator's status list.
const RESULT_MARKERS: &[&str] = &["Booked", "Received", "Departed", "Arrived", "Delivered", "In transit"];

/// Initial pause for the aggregator's background lookup.
const LOOKUP_SETTLE: Duration = Duration::from_secs(5);

/// Etihad Cargo (prefix 607), tracked through a parcel aggregator that
/// expects the dashed `607-XXXXXXXX` form.
#[derive(Debug, Default, Clone, Copy)]
pub struct Etihad;

#[async_trait]
impl Driver for Etihad {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        let dashed = identifier.display();
        tracing::info!(driver = NAME, identifier = %dashed, "Tracking via aggregator");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;

        require_visible(NAME, page, INPUT, INPUT_TIMEOUT).await?;
        human_type(page, &INPUT, &dashed).await?;
        page.click(&TRACK_BUTTON).await?;

        tokio::time::sleep(LOOKUP_SETTLE).await;
        settle(page, &[WaitStep::Element(RESULT_PANEL, Duration::from_secs(20))]).await;

        let extraction = extract(NAME, page, None, &ExtractPolicy::default()).await?;
        require_marker(NAME, &extraction.text, RESULT_MARKERS)?;
        Ok(extraction.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedPage;

    #[tokio::test(start_paused = true)]
    async fn types_dashed_form() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_visible(RESULT_PANEL)
            .with_body("607-12345678 Delivered AUH -> LHR, 3 pieces, 120 kg, last event 12 Oct");

        let text = Etihad
            .drive(&page, &Identifier::parse("60712345678").unwrap())
            .await
            .unwrap();

        assert!(text.contains("Delivered"));
        assert_eq!(page.value_of(&INPUT), "607-12345678");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_input_fails() {
        let page = ScriptedPage::new();
        let err = Etihad
            .drive(&page, &Identifier::parse("607-12345678").unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::SiteInteraction { driver: "etihad", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_alert_fails() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_visible(RESULT_PANEL)
            .with_body("Parcel not found. The carrier has no information about 607-12345678 yet.");

        let err = Etihad
            .drive(&page, &Identifier::parse("607-12345678").unwrap())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::SiteInteraction { driver: "etihad", .. }));
    }
}
