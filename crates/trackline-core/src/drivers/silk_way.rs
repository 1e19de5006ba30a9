use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{Locator, Page};
use crate::error::AppError;
use crate::evasion::{dismiss_consent, human_type, retype};
use crate::extract::{WaitStep, extract_scope, settle};
use crate::models::Identifier;

const NAME: &str = "silk_way";
const ENTRY_URL: &str = "https://www.silkwaywest.com/e-services/shipment-tracking/";

const PREFIX_INPUT: Locator = Locator::Css("input[name='pfx']");
const SUFFIX_INPUT: Locator = Locator::Css("input[name='awb']");
const TRACK_BUTTON: Locator = Locator::Css(".call_iframe");
const FRAME_BLOCK: Locator = Locator::Css(".iframe_block");
const RESULT_FRAME: Locator = Locator::Css(".iframe_block iframe");
const RESULT_TABLE: Locator = Locator::Css("table");

/// The frame's source loads only after its container is shown.
const FRAME_LOAD_SETTLE: Duration = Duration::from_secs(5);
const MIN_FRAME_TEXT: usize = 50;

/// Silk Way West (prefixes 501 and 463). Results render inside an iframe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilkWay;

#[async_trait]
impl Driver for SilkWay {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, prefix = identifier.prefix(), suffix = identifier.suffix(), "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        dismiss_consent(page).await;

        require_visible(NAME, page, PREFIX_INPUT, INPUT_TIMEOUT).await?;
        // The prefix field ships with a placeholder value.
        retype(page, &PREFIX_INPUT, identifier.prefix()).await?;
        human_type(page, &SUFFIX_INPUT, identifier.suffix()).await?;
        page.click(&TRACK_BUTTON).await?;

        require_visible(NAME, page, FRAME_BLOCK, Duration::from_secs(10)).await?;
        tokio::time::sleep(FRAME_LOAD_SETTLE).await;

        let frame = page
            .child_frame(&RESULT_FRAME)
            .await?
            .ok_or_else(|| AppError::site(NAME, "could not attach to tracking frame"))?;

        if settle(
            frame.as_ref(),
            &[WaitStep::Element(RESULT_TABLE, Duration::from_secs(20))],
        )
        .await
        .is_none()
        {
            tracing::warn!(driver = NAME, "Result table never appeared in frame");
        }

        let (text, source) = extract_scope(NAME, frame.as_ref(), MIN_FRAME_TEXT).await?;
        tracing::info!(driver = NAME, chars = text.len(), source = ?source, "Extracted frame");
        Ok(text)
    }
}
