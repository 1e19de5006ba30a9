use std::time::Duration;

use async_trait::async_trait;

use super::{Driver, INPUT_TIMEOUT, NAVIGATION_TIMEOUT, require_visible};
use crate::browser::{BODY, Locator, Page};
use crate::error::AppError;
use crate::evasion::{dismiss_consent, retype};
use crate::extract::{ExtractPolicy, WaitStep, extract_scope, settle};
use crate::models::Identifier;
use crate::util::truncate_chars;

const NAME: &str = "saudia";
const ENTRY_URL: &str = "https://saudiacargo.com/en/digital-services?tab=trackShipment";

const INPUT: Locator = Locator::Css("input[placeholder='Enter AWB Number']");
const SUBMIT: Locator = Locator::CssWithText("button", "Submit");
const SITE_ERROR: Locator = Locator::Css(".text-red-600");

const DYNAMIC_CONTENT_SETTLE: Duration = Duration::from_secs(5);
const MAX_BODY_CHARS: usize = 5000;

/// Containers the result widget has been seen in, most specific first.
const RESULT_CONTAINERS: &[Locator] = &[
    Locator::Css("table"),
    Locator::Css(".tracking-results"),
    Locator::Css(".results-container"),
    Locator::Css("[class*='result']"),
    Locator::Css("[class*='tracking']"),
    Locator::Css(".shipment-details"),
    Locator::Css(".tracking-table"),
    Locator::Css(".status-table"),
    Locator::Css("[id*='result']"),
    Locator::Css("[id*='tracking']"),
    Locator::Css("tbody"),
    Locator::Css("tr"),
    Locator::Css("[class*='status']"),
];
const MAX_ELEMENTS_PER_CONTAINER: usize = 10;
/// Element texts at or below this length are labels, not results.
const MIN_ELEMENT_CHARS: usize = 10;
const RESULT_BLOCK_HEADER: &str = "\n--- TRACKING DATA ---\n";

/// Labels that mark an element as a rendered result.
const RESULT_INDICATORS: &[&str] = &["AWB:", "Status:", "Date:", "Destination:", "Flight", "RCF", "DMM"];

/// Labels that only appear on a rendered tracking result.
const TRACKING_KEYWORDS: &[&str] = &[
    "AWB:",
    "Status:",
    "Date:",
    "Destination:",
    "Flight",
    "Segment",
    "RCF",
    "DMM",
    "Total Pieces",
    "Weight",
    "Volume",
];

/// Fragments that mark a line as data rather than page chrome.
const DATA_PATTERNS: &[&str] = &[":", "-", "/", "Local Time", "Flight", "Departed", "Arrived"];

/// Saudia Cargo (prefix 065).
#[derive(Debug, Default, Clone, Copy)]
pub struct Saudia;

#[async_trait]
impl Driver for Saudia {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
        tracing::info!(driver = NAME, identifier = %identifier, "Tracking");
        page.goto(ENTRY_URL, NAVIGATION_TIMEOUT).await?;
        dismiss_consent(page).await;

        require_visible(NAME, page, INPUT, INPUT_TIMEOUT).await?;
        page.click(&INPUT).await?;
        retype(page, &INPUT, identifier.normalized()).await?;
        page.click(&SUBMIT).await?;

        settle(page, &[WaitStep::NetworkIdle(Duration::from_secs(20))]).await;
        tokio::time::sleep(DYNAMIC_CONTENT_SETTLE).await;

        if page.is_visible(&SITE_ERROR).await.unwrap_or(false) {
            return Err(AppError::site(NAME, "site reported an invalid AWB or a system error"));
        }

        let min_usable = ExtractPolicy::default().min_usable_chars;

        if let Some(blocks) = scan_result_containers(page).await {
            if usable(&blocks, min_usable) {
                tracing::info!(driver = NAME, chars = blocks.len(), "Extracted result containers");
                return Ok(blocks);
            }
        }

        let body = page.inner_text(&BODY).await?;
        let lines = filter_tracking_lines(&body)
            .ok_or_else(|| AppError::site(NAME, "no tracking data found on result page"))?;
        if usable(&lines, min_usable) {
            return Ok(lines);
        }

        tracing::warn!(driver = NAME, chars = lines.len(), "Tracking lines too short, using page extraction");
        let (text, _) = extract_scope(NAME, page, min_usable).await?;
        Ok(text)
    }
}

fn usable(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() >= min_chars
}

/// Texts of the first result container holding tracking labels, each
/// under a [`RESULT_BLOCK_HEADER`]. `None` when no container qualifies.
async fn scan_result_containers(page: &dyn Page) -> Option<String> {
    for container in RESULT_CONTAINERS {
        let texts = match page.inner_texts(container, MAX_ELEMENTS_PER_CONTAINER).await {
            Ok(texts) => texts,
            Err(e) => {
                tracing::debug!(driver = NAME, container = %container, error = %e, "Container read failed");
                continue;
            }
        };

        let blocks: String = texts
            .iter()
            .filter(|text| {
                !text.trim().is_empty()
                    && text.chars().count() > MIN_ELEMENT_CHARS
                    && RESULT_INDICATORS.iter().any(|i| text.contains(i))
            })
            .map(|text| format!("{RESULT_BLOCK_HEADER}{text}\n"))
            .collect();

        if !blocks.is_empty() {
            return Some(blocks);
        }
    }
    None
}

/// Keep only the lines of `body` that carry tracking data.
///
/// `None` when the page shows no tracking keyword at all. When keywords are
/// present but no individual line qualifies, the body is returned capped at
/// [`MAX_BODY_CHARS`].
fn filter_tracking_lines(body: &str) -> Option<String> {
    if !TRACKING_KEYWORDS.iter().any(|k| body.contains(k)) {
        return None;
    }

    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            TRACKING_KEYWORDS.iter().any(|k| line.contains(k))
                || (line.chars().count() > 5 && DATA_PATTERNS.iter().any(|p| line.contains(p)))
        })
        .collect();

    if lines.is_empty() {
        Some(truncate_chars(body, MAX_BODY_CHARS).to_string())
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedPage;

    #[test]
    fn keeps_data_lines_only() {
        let body = "Home\nServices\nAWB: 065-12345678\nStatus: RCF\n\nContact us\nFlight SV985 Departed 12/10 Local Time\nok";
        let filtered = filter_tracking_lines(body).unwrap();
        assert_eq!(
            filtered,
            "AWB: 065-12345678\nStatus: RCF\nFlight SV985 Departed 12/10 Local Time"
        );
    }

    #[test]
    fn page_without_keywords_yields_nothing() {
        assert_eq!(filter_tracking_lines("Track your shipment\nSubmit"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn site_error_banner_fails_the_driver() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_visible(SITE_ERROR)
            .with_body("AWB: not found");

        let err = Saudia
            .drive(&page, &Identifier::parse("065-12345678").unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::SiteInteraction { driver: "saudia", .. }));
    }

    fn awb() -> Identifier {
        Identifier::parse("065-12345678").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn clears_field_before_typing() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_network_idle()
            .with_body("AWB: 06512345678\nStatus: DLV\nDestination: RUH\nFlight SV985 Departed JED 12/10");

        let text = Saudia
            .drive(&page, &Identifier::parse("065-12345678").unwrap())
            .await
            .unwrap();

        assert!(text.contains("Status: DLV"));
        assert_eq!(page.value_of(&INPUT), "06512345678");
        assert!(page.actions().contains(&format!("fill {INPUT}=")));
    }

    #[tokio::test(start_paused = true)]
    async fn result_containers_come_first() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_body("Home\nAWB: 06512345678")
            .with_elements(Locator::Css("table"), &["Menu", ""])
            .with_elements(
                Locator::Css("[class*='result']"),
                &["AWB: 065-12345678 Status: RCF Destination: RUH Flight SV985", "About us footer"],
            );

        let text = Saudia.drive(&page, &awb()).await.unwrap();

        assert_eq!(
            text,
            "\n--- TRACKING DATA ---\nAWB: 065-12345678 Status: RCF Destination: RUH Flight SV985\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_keyword_fragment_is_not_a_result() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_body("Home\nWeight\nContact");

        let err = Saudia.drive(&page, &awb()).await.err().unwrap();

        assert!(matches!(err, AppError::SiteInteraction { driver: "saudia", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn short_lines_fall_back_to_page_extraction() {
        let body = format!("AWB: 06512345678\n{}", "Saudia Cargo digital services ".repeat(3));
        let page = ScriptedPage::new().with_visible(INPUT).with_body(body.clone());

        let text = Saudia.drive(&page, &awb()).await.unwrap();

        assert_eq!(text, body);
    }

    #[tokio::test(start_paused = true)]
    async fn page_without_tracking_labels_fails() {
        let page = ScriptedPage::new()
            .with_visible(INPUT)
            .with_body("Track your shipment with Saudia Cargo digital services today");

        let err = Saudia.drive(&page, &awb()).await.err().unwrap();
        assert!(matches!(err, AppError::SiteInteraction { driver: "saudia", .. }));
    }
}
