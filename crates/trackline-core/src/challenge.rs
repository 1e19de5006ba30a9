//! Bounded image-challenge solver.
//!
//! Runs `Capture → Solve → Submit → Evaluate` at most
//! [`ChallengeSpec::max_attempts`] times. A wrong answer is detected by the
//! absence of the expected popup; the site's regenerate control is then used
//! and the loop starts over with a fresh image. Exhaustion is a hard failure
//! for the calling driver, which never wraps the loop in another retry.

use std::time::Duration;

use crate::browser::{Locator, Page, WaitOutcome, WaitTarget};
use crate::error::AppError;
use crate::traits::CaptchaSolver;

/// Selectors and timings of one site's challenge form.
#[derive(Debug, Clone)]
pub struct ChallengeSpec {
    /// Driver name used in errors and logs.
    pub driver: &'static str,
    pub image: Locator,
    pub answer: Locator,
    /// Control whose click should open the results popup.
    pub submit: Locator,
    pub regenerate: Locator,
    pub max_attempts: u32,
    /// Bound on waiting for the image element to appear.
    pub image_timeout: Duration,
    /// Pause before capturing, letting the image finish rendering.
    pub capture_settle: Duration,
    pub popup_timeout: Duration,
    /// Pause after regenerating before the next capture.
    pub regenerate_settle: Duration,
}

impl ChallengeSpec {
    pub fn new(
        driver: &'static str,
        image: Locator,
        answer: Locator,
        submit: Locator,
        regenerate: Locator,
    ) -> Self {
        Self {
            driver,
            image,
            answer,
            submit,
            regenerate,
            max_attempts: 2,
            image_timeout: Duration::from_secs(10),
            capture_settle: Duration::from_secs(1),
            popup_timeout: Duration::from_secs(10),
            regenerate_settle: Duration::from_secs(2),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Transient per-attempt state; dropped when the loop ends.
#[derive(Debug, Clone)]
pub struct ChallengeAttempt {
    pub attempt_index: u32,
    pub image_bytes: Vec<u8>,
    pub solved_text: Option<String>,
}

enum State {
    Capture { attempt_index: u32 },
    Solve(ChallengeAttempt),
    Submit(ChallengeAttempt),
    Evaluate(ChallengeAttempt, Option<Box<dyn Page>>),
}

/// Solve the challenge on `page` and return the results popup it unlocks.
pub async fn solve_challenge(
    page: &dyn Page,
    spec: &ChallengeSpec,
    solver: &dyn CaptchaSolver,
) -> Result<Box<dyn Page>, AppError> {
    let mut state = State::Capture { attempt_index: 0 };

    loop {
        state = match state {
            State::Capture { attempt_index } => {
                if attempt_index >= spec.max_attempts {
                    return Err(exhausted(spec));
                }
                tracing::info!(driver = spec.driver, attempt = attempt_index + 1, "Challenge attempt");

                let waited = page
                    .wait_for(&WaitTarget::Visible(spec.image), spec.image_timeout)
                    .await?;
                if waited == WaitOutcome::TimedOut {
                    return Err(AppError::site(spec.driver, "challenge image never appeared"));
                }
                tokio::time::sleep(spec.capture_settle).await;
                let image_bytes = page.screenshot(&spec.image).await?;

                State::Solve(ChallengeAttempt {
                    attempt_index,
                    image_bytes,
                    solved_text: None,
                })
            }
            State::Solve(mut attempt) => {
                let answer = solver
                    .solve(&attempt.image_bytes)
                    .await?
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty());
                match answer {
                    Some(text) => {
                        attempt.solved_text = Some(text);
                        State::Submit(attempt)
                    }
                    // Same image would give the same non-answer.
                    None => {
                        return Err(AppError::site(
                            spec.driver,
                            "vision classifier returned no answer",
                        ));
                    }
                }
            }
            State::Submit(attempt) => {
                let text = attempt.solved_text.as_deref().unwrap_or_default();
                page.fill(&spec.answer, text).await?;
                let popup = page
                    .click_expecting_popup(&spec.submit, spec.popup_timeout)
                    .await?;
                State::Evaluate(attempt, popup)
            }
            State::Evaluate(attempt, Some(popup)) => {
                tracing::info!(
                    driver = spec.driver,
                    attempt = attempt.attempt_index + 1,
                    "Challenge accepted, results popup opened"
                );
                return Ok(popup);
            }
            State::Evaluate(attempt, None) => {
                let next = attempt.attempt_index + 1;
                if next >= spec.max_attempts {
                    return Err(exhausted(spec));
                }
                tracing::warn!(
                    driver = spec.driver,
                    attempt = next,
                    "No popup after challenge answer, regenerating image"
                );
                page.click(&spec.regenerate).await?;
                tokio::time::sleep(spec.regenerate_settle).await;
                State::Capture {
                    attempt_index: next,
                }
            }
        };
    }
}

fn exhausted(spec: &ChallengeSpec) -> AppError {
    tracing::warn!(
        driver = spec.driver,
        attempts = spec.max_attempts,
        "Challenge attempts exhausted"
    );
    AppError::ChallengeExhausted {
        attempts: spec.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockSolver, ScriptedPage};

    fn spec() -> ChallengeSpec {
        ChallengeSpec::new(
            "test",
            Locator::Css("#captcha"),
            Locator::Css("#answer"),
            Locator::Css("#search"),
            Locator::Css("#regen"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_answer_accepted() {
        let popup = ScriptedPage::new().with_body("results");
        let page = ScriptedPage::new()
            .with_visible(Locator::Css("#captcha"))
            .with_popup(Some(popup));
        let solver = MockSolver::new(vec![Ok(Some("X7KQ".into()))]);

        let result = solve_challenge(&page, &spec(), &solver).await.unwrap();

        assert_eq!(result.inner_text(&crate::browser::BODY).await.unwrap(), "results");
        assert_eq!(solver.calls(), 1);
        assert_eq!(page.value_of(&Locator::Css("#answer")), "X7KQ");
        assert!(!page.clicks().contains(&"#regen".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_answer_regenerates_then_succeeds() {
        let page = ScriptedPage::new()
            .with_visible(Locator::Css("#captcha"))
            .with_popup(None)
            .with_popup(Some(ScriptedPage::new()));
        let solver = MockSolver::new(vec![Ok(Some("AAAA".into())), Ok(Some("BBBB".into()))]);

        solve_challenge(&page, &spec(), &solver).await.unwrap();

        assert_eq!(solver.calls(), 2);
        assert_eq!(page.clicks().iter().filter(|c| *c == "#regen").count(), 1);
        assert_eq!(page.value_of(&Locator::Css("#answer")), "BBBB");
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_wrong_answers_exhaust_after_max_attempts() {
        let page = ScriptedPage::new().with_visible(Locator::Css("#captcha"));
        let solver = MockSolver::always("WRONG");

        let err = solve_challenge(&page, &spec(), &solver).await.err().unwrap();

        assert!(matches!(err, AppError::ChallengeExhausted { attempts: 2 }));
        assert_eq!(solver.calls(), 2);
        assert_eq!(page.screenshots(), 2);
        assert_eq!(page.clicks().iter().filter(|c| *c == "#regen").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn last_wrong_answer_skips_regeneration() {
        let page = ScriptedPage::new().with_visible(Locator::Css("#captcha"));
        let solver = MockSolver::always("WRONG");
        let started = tokio::time::Instant::now();

        let err = solve_challenge(&page, &spec().with_max_attempts(3), &solver)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::ChallengeExhausted { attempts: 3 }));
        let clicks = page.clicks();
        assert_eq!(clicks.iter().filter(|c| *c == "#regen").count(), 2);
        assert_eq!(clicks.last().map(String::as_str), Some("#search"));
        // Three capture settles, two regenerate settles.
        assert_eq!(started.elapsed(), Duration::from_secs(3 + 2 * 2));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_bound_is_configurable() {
        let page = ScriptedPage::new().with_visible(Locator::Css("#captcha"));
        let solver = MockSolver::always("WRONG");

        let err = solve_challenge(&page, &spec().with_max_attempts(4), &solver)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::ChallengeExhausted { attempts: 4 }));
        assert_eq!(solver.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_answer_fails_immediately() {
        let page = ScriptedPage::new()
            .with_visible(Locator::Css("#captcha"))
            .with_popup(Some(ScriptedPage::new()));
        let solver = MockSolver::new(vec![Ok(Some("   ".into()))]);

        let err = solve_challenge(&page, &spec(), &solver).await.err().unwrap();

        assert!(matches!(err, AppError::SiteInteraction { .. }));
        assert_eq!(solver.calls(), 1);
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_image_is_a_site_failure() {
        let page = ScriptedPage::new();
        let solver = MockSolver::always("X");

        let err = solve_challenge(&page, &spec(), &solver).await.err().unwrap();

        assert!(matches!(err, AppError::SiteInteraction { .. }));
        assert_eq!(solver.calls(), 0);
    }
}
