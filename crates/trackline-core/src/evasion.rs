//! Human-like interaction helpers shared by every carrier driver.
//!
//! Nothing here keeps state between calls. Failures of the best-effort steps
//! (banner dismissal) are logged and swallowed; they never change a driver's
//! result.

use std::time::Duration;

use rand::Rng;

use crate::browser::{Locator, Page};
use crate::error::AppError;

/// Inclusive lower bound of the per-keystroke delay.
pub const KEYSTROKE_MIN: Duration = Duration::from_millis(50);
/// Exclusive upper bound of the per-keystroke delay.
pub const KEYSTROKE_MAX: Duration = Duration::from_millis(150);

/// Consent buttons tried in order; the first visible one is clicked.
pub const CONSENT_BUTTONS: &[Locator] = &[
    Locator::CssWithText("button", "Accept"),
    Locator::CssWithText("button", "Agree"),
    Locator::CssWithText("button", "Allow All"),
    Locator::Css("#onetrust-accept-btn-handler"),
    Locator::Css(".cookie-close-btn"),
];

/// Chromium flags that hide the most obvious automation fingerprints.
pub const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--window-size=1920,1080",
];

/// Settle time after a validation trigger on a disabled submit control.
pub const VALIDATION_SETTLE: Duration = Duration::from_secs(1);

/// How the submit control was finally activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The control was enabled on the first check.
    Clicked,
    /// The control was disabled; validation was triggered once, then clicked.
    ClickedAfterValidation,
}

/// Type `text` one character at a time with a randomized pause between
/// keystrokes. Falls back to setting the value directly when keystrokes
/// cannot be delivered, so the field is never silently left empty.
pub async fn human_type(page: &dyn Page, locator: &Locator, text: &str) -> Result<(), AppError> {
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        if let Err(e) = page.type_text(locator, ch.encode_utf8(&mut buf)).await {
            tracing::warn!(%locator, error = %e, "Keystroke typing failed, filling directly");
            return page.fill(locator, text).await;
        }
        tokio::time::sleep(keystroke_delay()).await;
    }
    Ok(())
}

/// Clear a field, then type into it like a human.
pub async fn retype(page: &dyn Page, locator: &Locator, text: &str) -> Result<(), AppError> {
    page.fill(locator, "").await?;
    human_type(page, locator, text).await
}

/// Try each consent pattern in `candidates`; click the first visible one.
///
/// Returns the index of the pattern that was dismissed, if any. Errors from
/// individual attempts are treated as "not present".
pub async fn dismiss_banners(page: &dyn Page, candidates: &[Locator]) -> Option<usize> {
    for (idx, locator) in candidates.iter().enumerate() {
        match page.is_visible(locator).await {
            Ok(true) => match page.click(locator).await {
                Ok(()) => {
                    tracing::debug!(%locator, "Consent banner dismissed");
                    return Some(idx);
                }
                Err(e) => {
                    tracing::debug!(%locator, error = %e, "Consent button click failed");
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(%locator, error = %e, "Consent button lookup failed");
            }
        }
    }
    None
}

/// [`dismiss_banners`] over the default [`CONSENT_BUTTONS`].
pub async fn dismiss_consent(page: &dyn Page) -> Option<usize> {
    dismiss_banners(page, CONSENT_BUTTONS).await
}

/// Click `submit`, first nudging client-side validation if it is disabled.
///
/// A disabled control gets exactly one validation trigger on `input`
/// (Enter key, then `change`/`blur` events), a fixed settle delay, and one
/// click. The control is never polled until it becomes enabled.
pub async fn submit(
    page: &dyn Page,
    submit: &Locator,
    input: &Locator,
) -> Result<SubmitOutcome, AppError> {
    if page.is_enabled(submit).await.unwrap_or(true) {
        page.click(submit).await?;
        return Ok(SubmitOutcome::Clicked);
    }

    tracing::info!(%submit, "Submit control disabled, triggering validation");
    if let Err(e) = page.press(input, "Enter").await {
        tracing::debug!(error = %e, "Enter on input failed");
    }
    for event in ["change", "blur"] {
        if let Err(e) = page.dispatch_event(input, event).await {
            tracing::debug!(event, error = %e, "Validation event dispatch failed");
        }
    }
    tokio::time::sleep(VALIDATION_SETTLE).await;

    page.click(submit).await?;
    Ok(SubmitOutcome::ClickedAfterValidation)
}

/// Random delay in `[KEYSTROKE_MIN, KEYSTROKE_MAX)`.
pub fn keystroke_delay() -> Duration {
    rand::thread_rng().gen_range(KEYSTROKE_MIN..KEYSTROKE_MAX)
}
