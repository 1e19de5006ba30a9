use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{LoadState, Locator, Page, WaitTarget};
use crate::challenge::{ChallengeSpec, solve_challenge};
use crate::error::AppError;
use crate::evasion::{dismiss_banners, dismiss_consent, human_type};
use crate::extract::{ExtractPolicy, extract};
use crate::models::Identifier;
use crate::traits::CaptchaSolver;

const NAME: &str = "china_airlines";
const ENTRY_URL: &str = "https://cargo.china-airlines.com/CCNetv2/content/home/index.aspx";

const SITE_CONSENT: &[Locator] = &[Locator::CssWithText("button", "I accept")];
const TRACKING_MENU: Locator = Locator::Css("#shipment_traking");
const TRACKING_BLOCK: Locator = Locator::Css("#shipment_traking_block");
const PREFIX_INPUT: Locator = Locator::Css("#ContentPlaceHolder1_txtAwbPfx");
const SUFFIX_INPUT: Locator = Locator::Css("#ContentPlaceHolder1_txtAwbNum");

const CAPTCHA_IMAGE: Locator = Locator::Css("#imgVldCode_Index_ShipmentTracking");
const CAPTCHA_ANSWER: Locator = Locator::Css("#txtVldCode_Index_ShipmentTracking");
const SEARCH_BUTTON: Locator = Locator::Css("#button_st");
const CAPTCHA_REGENERATE: Locator = Locator::Css("#imgbReGen_Index_ShipmentTracking");

/// China Airlines Cargo (prefix 297).
///
/// The search form is gated by an image challenge; results open in a new
/// window built from several frames.
#[derive(Clone)]
pub struct ChinaAirlines {
    solver: Arc<dyn CaptchaSolver>,
}

impl ChinaAirlines {
    pub fn new(solver: Arc<dyn CaptchaSolver>) -> Self {
        Self { solver }
    }

    fn challenge() -> ChallengeSpec {
        ChallengeSpec::new(
            NAME,
            CAPTCHA_IMAGE,
            CAPTCHA_ANSWER,
            SEARCH_BUTTON,
            CAPTCHA_REGENERATE,
        )
    }
}

#[async_trait]
impl Driver for ChinaAirlines {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, prefix = identifier.prefix(), suffix = identifier.suffix(), "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        if dismiss_banners(page, SITE_CONSENT).await.is_none() {
            dismiss_consent(page).await;
        }

        page.click(&TRACKING_MENU).await?;
        require_visible(NAME, page, TRACKING_BLOCK, Duration::from_secs(5)).await?;
        human_type(page, &PREFIX_INPUT, identifier.prefix()).await?;
        human_type(page, &SUFFIX_INPUT, identifier.suffix()).await?;

        let popup = solve_challenge(page, &Self::challenge(), self.solver.as_ref()).await?;

        let idle = popup
            .wait_for(
                &WaitTarget::Load(LoadState::NetworkIdle),
                Duration::from_secs(10),
            )
            .await;
        if !matches!(idle, Ok(outcome) if outcome.matched()) {
            tracing::info!(driver = NAME, "Result window never went idle, extracting anyway");
        }

        let policy = ExtractPolicy::default().with_min_usable(10);
        let extraction = extract(NAME, page, Some(popup.as_ref()), &policy).await?;
        tracing::info!(driver = NAME, chars = extraction.text.len(), source = ?extraction.source, "Extracted");
        Ok(extraction.text)
    }
}
