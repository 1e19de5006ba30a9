use std::time::Duration;

use async_trait::async_trait;

use super::Driver;
use crate::browser::{LoadState, Locator, Page, WaitTarget};
use crate::error::AppError;
use crate::evasion::human_type;
use crate::extract::{ExtractPolicy, WaitStep, extract, settle};
use crate::models::{Identifier, Mode};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);
const POPUP_TIMEOUT: Duration = Duration::from_secs(10);
const POPUP_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const INPUT: Locator = Locator::Css("input[name='number']");
const DIRECT_BUTTON: Locator = Locator::Css("#wc-multi-form-button_direct");
/// Confirmation page shown before redirecting to the carrier site.
const INTERSTITIAL: Locator = Locator::Text("I'm sure, continue with");

/// Catch-all driver that hands the identifier to the track-trace.com
/// redirector and reads whatever carrier page it opens.
#[derive(Debug, Clone, Copy)]
pub struct TrackTrace {
    mode: Mode,
}

impl TrackTrace {
    pub fn air() -> Self {
        Self { mode: Mode::Air }
    }

    pub fn sea() -> Self {
        Self { mode: Mode::Sea }
    }

    fn entry_url(&self) -> &'static str {
        match self.mode {
            Mode::Air => "https://www.track-trace.com/aircargo",
            Mode::Sea => "https://www.track-trace.com/container",
        }
    }

    fn interstitial_timeout(&self) -> Duration {
        match self.mode {
            Mode::Air => Duration::from_secs(3),
            Mode::Sea => Duration::from_secs(5),
        }
    }

    /// Carrier sites behind the redirector have no common completion signal.
    fn carrier_settle(&self) -> Duration {
        match self.mode {
            Mode::Air => Duration::from_secs(5),
            Mode::Sea => Duration::from_secs(8),
        }
    }
}

#[async_trait]
impl Driver for TrackTrace {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Air => "air_fallback",
            Mode::Sea => "sea_fallback",
        }
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        let name = self.name();
        tracing::info!(driver = name, identifier = %identifier, "Routing to track-trace");
        page.goto(self.entry_url(), NAVIGATION_TIMEOUT).await?;

        human_type(page, &INPUT, identifier.normalized()).await?;
        let popup = page
            .click_expecting_popup(&DIRECT_BUTTON, POPUP_TIMEOUT)
            .await?
            .ok_or_else(|| AppError::site(name, "redirector did not open a carrier tab"))?;

        let dom_ready = WaitTarget::Load(LoadState::DomContentLoaded);
        popup.wait_for(&dom_ready, POPUP_LOAD_TIMEOUT).await?;

        let interstitial = [WaitStep::Element(INTERSTITIAL, self.interstitial_timeout())];
        if settle(popup.as_ref(), &interstitial).await.is_some() {
            tracing::info!(driver = name, "Confirming redirect interstitial");
            popup.click(&INTERSTITIAL).await?;
            popup.wait_for(&dom_ready, POPUP_LOAD_TIMEOUT).await?;
        }

        tokio::time::sleep(self.carrier_settle()).await;
        let extraction = extract(name, page, Some(popup.as_ref()), &ExtractPolicy::default()).await?;
        Ok(extraction.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedPage;

    fn carrier_page() -> ScriptedPage {
        ScriptedPage::new().with_body(
            "MSCU1234567  40' HIGH CUBE  Port of Discharge: Jebel Ali  ETA 24/10/2026",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reads_the_carrier_tab() {
        let page = ScriptedPage::new().with_popup(Some(carrier_page()));

        let text = TrackTrace::sea()
            .drive(&page, &Identifier::parse("MSCU1234567").unwrap())
            .await
            .unwrap();

        assert!(text.contains("Jebel Ali"));
        assert_eq!(page.visited(), vec!["https://www.track-trace.com/container".to_string()]);
        assert_eq!(page.value_of(&INPUT), "MSCU1234567");
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_interstitial() {
        let popup = carrier_page().with_visible(INTERSTITIAL);
        let page = ScriptedPage::new().with_popup(Some(popup.clone()));

        TrackTrace::air()
            .drive(&page, &Identifier::parse("176-12345678").unwrap())
            .await
            .unwrap();

        assert_eq!(popup.clicks(), vec![INTERSTITIAL.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_tab_is_a_site_failure() {
        let page = ScriptedPage::new();

        let err = TrackTrace::air()
            .drive(&page, &Identifier::parse("176-12345678").unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::SiteInteraction { driver: "air_fallback", .. }));
    }

    #[test]
    fn names_follow_mode() {
        assert_eq!(TrackTrace::air().name(), "air_fallback");
        assert_eq!(TrackTrace::sea().name(), "sea_fallback");
    }
}
