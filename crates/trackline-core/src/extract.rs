//! Settling and result extraction shared by every driver.
//!
//! Waiting is an ordered list of [`WaitStep`]s evaluated until one matches;
//! a step that times out falls through to the next. Extraction follows a
//! fixed precedence: popup, then multi-frame text, then body text, then raw
//! markup when the visible text is too short to trust.

use std::time::Duration;

use crate::browser::{BODY, Frame, LoadState, Locator, Page, WaitOutcome, WaitTarget};
use crate::error::AppError;

/// Separator placed between the texts of multiple frames.
pub const FRAME_SEPARATOR: &str = "\n--- FRAME DATA ---\n";

/// One entry of a settle chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStep {
    /// An element that only exists on a successful result page.
    Element(Locator, Duration),
    /// Generic "page settled" signal.
    NetworkIdle(Duration),
    /// Unconditional pause; always matches.
    Delay(Duration),
}

/// Evaluate `steps` in order and return the index of the first one that
/// matched. Wait errors count as timeouts. `None` means every step timed out.
pub async fn settle(scope: &dyn Frame, steps: &[WaitStep]) -> Option<usize> {
    for (idx, step) in steps.iter().enumerate() {
        let outcome = match *step {
            WaitStep::Element(locator, timeout) => {
                scope.wait_for(&WaitTarget::Visible(locator), timeout).await
            }
            WaitStep::NetworkIdle(timeout) => {
                scope
                    .wait_for(&WaitTarget::Load(LoadState::NetworkIdle), timeout)
                    .await
            }
            WaitStep::Delay(pause) => {
                tokio::time::sleep(pause).await;
                Ok(WaitOutcome::Matched)
            }
        };
        match outcome {
            Ok(WaitOutcome::Matched) => {
                tracing::debug!(step = idx, "Settle step matched");
                return Some(idx);
            }
            Ok(WaitOutcome::TimedOut) => {
                tracing::info!(step = ?step, "Settle step timed out, falling through");
            }
            Err(e) => {
                tracing::warn!(step = ?step, error = %e, "Settle step failed, falling through");
            }
        }
    }
    None
}

/// Length thresholds for one site's extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPolicy {
    /// Frames whose text is not longer than this are treated as chrome.
    pub frame_min_chars: usize,
    /// Visible text shorter than this falls back to raw markup.
    pub min_usable_chars: usize,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            frame_min_chars: 50,
            min_usable_chars: 50,
        }
    }
}

impl ExtractPolicy {
    pub fn with_min_usable(mut self, chars: usize) -> Self {
        self.min_usable_chars = chars;
        self
    }
}

/// Where the extracted text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Frames { kept: usize },
    Body,
    Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub from_popup: bool,
    pub source: Source,
}

/// Run the result-location hierarchy.
///
/// `popup`, when present, replaces `page` as the extraction target. Fails
/// with [`AppError::SiteInteraction`] when even the raw markup is below the
/// usable threshold.
pub async fn extract(
    driver: &'static str,
    page: &dyn Page,
    popup: Option<&dyn Page>,
    policy: &ExtractPolicy,
) -> Result<Extraction, AppError> {
    let target = popup.unwrap_or(page);
    let from_popup = popup.is_some();

    let frames = match target.frames().await {
        Ok(frames) => frames,
        Err(e) => {
            tracing::debug!(driver, error = %e, "Frame enumeration failed");
            Vec::new()
        }
    };

    if frames.len() > 1 {
        let mut kept = Vec::new();
        for frame in &frames {
            match frame.inner_text(&BODY).await {
                Ok(text) if text.trim().chars().count() > policy.frame_min_chars => {
                    kept.push(text);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(driver, error = %e, "Skipping unreadable frame"),
            }
        }
        if !kept.is_empty() {
            let text = kept.join(FRAME_SEPARATOR);
            tracing::info!(driver, frames = frames.len(), kept = kept.len(), chars = text.len(), "Extracted multi-frame text");
            if text.trim().chars().count() >= policy.min_usable_chars {
                return Ok(Extraction {
                    text,
                    from_popup,
                    source: Source::Frames { kept: kept.len() },
                });
            }
        }
    }

    let (text, source) = extract_scope(driver, target, policy.min_usable_chars).await?;
    Ok(Extraction {
        text,
        from_popup,
        source,
    })
}

/// Body text of a single scope, or its markup when the text is too short.
pub async fn extract_scope(
    driver: &'static str,
    scope: &dyn Frame,
    min_usable_chars: usize,
) -> Result<(String, Source), AppError> {
    let body = match scope.inner_text(&BODY).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(driver, error = %e, "Body text unreadable");
            String::new()
        }
    };
    if body.trim().chars().count() >= min_usable_chars {
        return Ok((body, Source::Body));
    }

    tracing::warn!(driver, chars = body.len(), "Visible text too short, falling back to markup");
    let markup = scope.content().await?;
    if markup.trim().chars().count() < min_usable_chars {
        return Err(AppError::site(driver, "result page is empty"));
    }
    Ok((markup, Source::Markup))
}

/// Fail unless `text` contains at least one of `markers`.
pub fn require_marker(driver: &'static str, text: &str, markers: &[&str]) -> Result<(), AppError> {
    if markers.iter().any(|m| text.contains(m)) {
        Ok(())
    } else {
        Err(AppError::site(
            driver,
            format!("no result marker found (expected one of {markers:?})"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ScriptedFrame, ScriptedPage};

    const RESULT: Locator = Locator::Text("SHIPMENT DETAILS");

    fn long(label: &str) -> String {
        format!("{label} {}", "status line ".repeat(10))
    }

    #[tokio::test(start_paused = true)]
    async fn settle_stops_at_first_match() {
        let page = ScriptedPage::new().with_visible(RESULT);
        let steps = [
            WaitStep::Element(RESULT, Duration::from_secs(20)),
            WaitStep::NetworkIdle(Duration::from_secs(5)),
        ];
        assert_eq!(settle(&page, &steps).await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_falls_through_on_timeout() {
        let page = ScriptedPage::new().with_network_idle();
        let steps = [
            WaitStep::Element(RESULT, Duration::from_secs(20)),
            WaitStep::NetworkIdle(Duration::from_secs(5)),
        ];
        assert_eq!(settle(&page, &steps).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_always_matches() {
        let page = ScriptedPage::new();
        let steps = [
            WaitStep::NetworkIdle(Duration::from_secs(5)),
            WaitStep::Delay(Duration::from_secs(3)),
        ];
        assert_eq!(settle(&page, &steps).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_reports_total_timeout() {
        let page = ScriptedPage::new();
        let steps = [WaitStep::Element(RESULT, Duration::from_secs(1))];
        assert_eq!(settle(&page, &steps).await, None);
    }

    #[tokio::test]
    async fn popup_takes_precedence() {
        let page = ScriptedPage::new().with_body(long("main page"));
        let popup = ScriptedPage::new().with_body(long("popup"));

        let out = extract("t", &page, Some(&popup), &ExtractPolicy::default())
            .await
            .unwrap();

        assert!(out.from_popup);
        assert!(out.text.starts_with("popup"));
        assert_eq!(out.source, Source::Body);
    }

    #[tokio::test]
    async fn multiple_frames_keep_only_substantial_ones() {
        let page = ScriptedPage::new()
            .with_body("main frame chrome")
            .with_frame(ScriptedFrame::new(long("flight segments")))
            .with_frame(ScriptedFrame::new("nav"))
            .with_frame(ScriptedFrame::new(long("piece counts")));

        let out = extract("t", &page, None, &ExtractPolicy::default())
            .await
            .unwrap();

        assert_eq!(out.source, Source::Frames { kept: 2 });
        let parts: Vec<_> = out.text.split(FRAME_SEPARATOR).collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("flight segments"));
        assert!(parts[1].starts_with("piece counts"));
    }

    #[tokio::test]
    async fn short_frames_fall_back_to_body_then_markup() {
        let page = ScriptedPage::new()
            .with_body("tiny")
            .with_frame(ScriptedFrame::new("also tiny"))
            .with_content(format!("<html><body>{}</body></html>", long("markup")));

        let out = extract("t", &page, None, &ExtractPolicy::default())
            .await
            .unwrap();

        assert_eq!(out.source, Source::Markup);
        assert!(out.text.starts_with("<html>"));
    }

    #[tokio::test]
    async fn lower_threshold_keeps_short_body() {
        let page = ScriptedPage::new().with_body("AWB 297 OK");
        let policy = ExtractPolicy::default().with_min_usable(10);

        let out = extract("t", &page, None, &policy).await.unwrap();
        assert_eq!(out.source, Source::Body);
        assert_eq!(out.text, "AWB 297 OK");
    }

    #[tokio::test]
    async fn empty_page_is_a_classified_failure() {
        let page = ScriptedPage::new().with_body("").with_content("");
        let err = extract("air_india", &page, None, &ExtractPolicy::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::SiteInteraction { driver: "air_india", .. }));
    }

    #[test]
    fn marker_check() {
        assert!(require_marker("d", "Origin: DEL", &["SHIPMENT DETAILS", "Origin"]).is_ok());
        assert!(require_marker("d", "Please try again", &["SHIPMENT DETAILS"]).is_err());
    }
}
