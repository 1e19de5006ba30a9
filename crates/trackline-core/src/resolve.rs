//! Two-tier resolution: hosted API first, carrier website second.
//!
//! The resolver owns the browser session for the browser tier. A session is
//! opened only after the fast path misses, handed to exactly one driver, and
//! closed exactly once on every exit path (success, driver error, overall
//! timeout, or panic inside the driver).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::browser::{BrowserLauncher, Page};
use crate::drivers::Driver;
use crate::error::AppError;
use crate::models::{AcquisitionResult, Identifier, Resolution, TrackingRequest};
use crate::routing::RouteTable;
use crate::traits::{FastPath, FastPathOutcome};

/// Source tag of results served by the hosted API.
pub const API_SOURCE_TAG: &str = "api";

/// Driver tag of failures that happen before any driver runs.
pub const BROWSER_SOURCE_TAG: &str = "browser";

/// Upper bound on one driver invocation, phases included.
pub const DEFAULT_DRIVER_BUDGET: Duration = Duration::from_secs(180);

pub struct Resolver<F: FastPath, L: BrowserLauncher> {
    fast_path: F,
    launcher: Arc<L>,
    routes: Arc<RouteTable>,
    driver_budget: Duration,
}

impl<F: FastPath, L: BrowserLauncher> Clone for Resolver<F, L> {
    fn clone(&self) -> Self {
        Self {
            fast_path: self.fast_path.clone(),
            launcher: Arc::clone(&self.launcher),
            routes: Arc::clone(&self.routes),
            driver_budget: self.driver_budget,
        }
    }
}

impl<F: FastPath, L: BrowserLauncher> Resolver<F, L> {
    pub fn new(fast_path: F, launcher: L, routes: RouteTable) -> Self {
        Self {
            fast_path,
            launcher: Arc::new(launcher),
            routes: Arc::new(routes),
            driver_budget: DEFAULT_DRIVER_BUDGET,
        }
    }

    pub fn with_driver_budget(mut self, budget: Duration) -> Self {
        self.driver_budget = budget;
        self
    }

    pub fn browser_available(&self) -> bool {
        self.launcher.is_available()
    }

    /// Resolve `request` into raw data or a classified failure. Never
    /// returns an error and never leaves a session open.
    pub async fn resolve(&self, request: &TrackingRequest) -> Resolution {
        let identifier = &request.identifier;
        tracing::info!(identifier = %identifier, mode = %request.mode, "Resolving");

        match self.fast_path.query(identifier, request.mode).await {
            FastPathOutcome::Found(snippet) => {
                tracing::info!(identifier = %identifier, chars = snippet.len(), "Fast path hit");
                return Resolution::Acquired(AcquisitionResult {
                    source_tag: API_SOURCE_TAG.to_string(),
                    raw_text: snippet,
                });
            }
            FastPathOutcome::Miss(reason) => {
                tracing::info!(identifier = %identifier, %reason, "Fast path miss, switching to browser tier");
            }
        }

        let driver = self.routes.select(request);
        let name = driver.name();

        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(identifier = %identifier, error = %error, "Browser session could not be opened");
                return Resolution::Failed {
                    driver: BROWSER_SOURCE_TAG,
                    error,
                };
            }
        };

        tracing::info!(identifier = %identifier, driver = name, "Driving carrier site");
        let outcome = self
            .run_driver(driver.as_ref(), session.page(), identifier)
            .await;

        if let Err(error) = &outcome {
            let url = session.page().url().await.unwrap_or_default();
            tracing::warn!(driver = name, kind = error.kind(), error = %error, url = %url, "Driver failed");
        }

        if let Err(e) = session.close().await {
            tracing::warn!(driver = name, error = %e, "Browser session close failed");
        }

        match outcome {
            Ok(text) if text.trim().is_empty() => {
                tracing::warn!(driver = name, "Driver returned no text");
                Resolution::NotImplemented { driver: name }
            }
            Ok(text) => {
                tracing::info!(driver = name, chars = text.len(), "Driver succeeded");
                Resolution::Acquired(AcquisitionResult {
                    source_tag: name.to_string(),
                    raw_text: text,
                })
            }
            Err(error) => {
                Resolution::Failed {
                    driver: name,
                    error,
                }
            }
        }
    }

    async fn run_driver(
        &self,
        driver: &dyn Driver,
        page: &dyn Page,
        identifier: &Identifier,
    ) -> Result<String, AppError> {
        let guarded = AssertUnwindSafe(driver.drive(page, identifier)).catch_unwind();
        match tokio::time::timeout(self.driver_budget, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(AppError::SessionCrash(panic_message(panic.as_ref()))),
            Err(_) => Err(AppError::Timeout(self.driver_budget.as_secs())),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "driver panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Locator;
    use crate::drivers::AirIndia;
    use crate::models::Mode;
    use crate::testutil::{MockDriver, MockFastPath, MockLauncher, MockSolver, ScriptedPage};
    use crate::traits::MissReason;
    use async_trait::async_trait;

    /// Visits a per-identifier URL, lingers, then reads back where it is.
    struct VisitingDriver;

    #[async_trait]
    impl Driver for VisitingDriver {
        fn name(&self) -> &'static str {
            "visiting"
        }

        async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError> {
            page.goto(&format!("https://carrier.test/{identifier}"), Duration::from_secs(5))
                .await?;
            tokio::time::sleep(Duration::from_secs(2)).await;
            page.url().await
        }
    }

    fn table(air: Arc<dyn Driver>) -> RouteTable {
        RouteTable::builder(air, MockDriver::named("sea_fallback"))
            .build()
            .unwrap()
    }

    fn air_request(id: &str) -> TrackingRequest {
        TrackingRequest::new(id, Mode::Air, "").unwrap()
    }

    #[tokio::test]
    async fn fast_path_hit_never_opens_a_browser() {
        let launcher = MockLauncher::new();
        let resolver = Resolver::new(
            MockFastPath::found("{\"summary\":{}}"),
            launcher.clone(),
            table(MockDriver::named("air")),
        );

        let resolution = resolver.resolve(&air_request("09812345678")).await;

        assert_eq!(resolution.source_tag(), "api");
        assert_eq!(resolution.raw_text(), "{\"summary\":{}}");
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn air_india_scenario_after_auth_failure() {
        let page = ScriptedPage::new()
            .with_visible(Locator::Css("input[formcontrolname='airlineCode']"))
            .with_visible(Locator::Text("SHIPMENT DETAILS"))
            .with_body("SHIPMENT DETAILS\nOrigin BOM  Destination LHR  Status Departed  4 pcs");
        let launcher = MockLauncher::with_page(page);
        let fast_path = MockFastPath::miss(MissReason::AuthFailure);
        let routes = RouteTable::standard(Arc::new(MockSolver::always("X"))).unwrap();
        let resolver = Resolver::new(fast_path.clone(), launcher.clone(), routes);

        let resolution = resolver.resolve(&air_request("09812345678")).await;

        assert!(resolution.is_acquired());
        assert_eq!(resolution.source_tag(), AirIndia.name());
        assert!(resolution.raw_text().contains("SHIPMENT DETAILS"));
        assert_eq!(fast_path.queries(), vec!["09812345678".to_string()]);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn driver_failure_still_closes_session_once() {
        let launcher = MockLauncher::new();
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::NotFound),
            launcher.clone(),
            table(Arc::new(MockDriver::failing("air", "no result data"))),
        );

        let resolution = resolver.resolve(&air_request("17612345678")).await;

        match resolution {
            Resolution::Failed { driver, error } => {
                assert_eq!(driver, "air");
                assert_eq!(error.kind(), "site_interaction");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test]
    async fn driver_panic_is_a_session_crash() {
        let launcher = MockLauncher::new();
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::EmptyList),
            launcher.clone(),
            table(Arc::new(MockDriver::panicking("air"))),
        );

        let resolution = resolver.resolve(&air_request("17612345678")).await;

        assert!(matches!(
            resolution,
            Resolution::Failed { error: AppError::SessionCrash(_), .. }
        ));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_driver_hits_overall_budget() {
        let launcher = MockLauncher::new();
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::Transport("timeout".into())),
            launcher.clone(),
            table(Arc::new(MockDriver::hanging("air"))),
        )
        .with_driver_budget(Duration::from_secs(30));

        let resolution = resolver.resolve(&air_request("17612345678")).await;

        assert!(matches!(
            resolution,
            Resolution::Failed { error: AppError::Timeout(30), .. }
        ));
        assert_eq!(launcher.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resolutions_use_separate_sessions() {
        let launcher = MockLauncher::fresh_pages();
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::NotFound),
            launcher.clone(),
            table(Arc::new(VisitingDriver)),
        );
        let first = air_request("17612345678");
        let second = air_request("09887654321");

        let (a, b) = tokio::join!(resolver.resolve(&first), resolver.resolve(&second));

        assert_eq!(a.raw_text(), format!("https://carrier.test/{}", first.identifier));
        assert_eq!(b.raw_text(), format!("https://carrier.test/{}", second.identifier));
        assert_eq!(launcher.launches(), 2);
        assert_eq!(launcher.closes(), 2);
        let pages = launcher.pages();
        assert_eq!(pages.len(), 2);
        let mut visited: Vec<Vec<String>> = pages.iter().map(ScriptedPage::visited).collect();
        visited.sort();
        let mut expected = vec![
            vec![format!("https://carrier.test/{}", first.identifier)],
            vec![format!("https://carrier.test/{}", second.identifier)],
        ];
        expected.sort();
        assert_eq!(visited, expected);
    }

    #[tokio::test]
    async fn empty_driver_text_is_not_implemented() {
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::NotConfigured),
            MockLauncher::new(),
            table(Arc::new(MockDriver::returning("air", "  "))),
        );

        let resolution = resolver.resolve(&air_request("17612345678")).await;

        assert!(matches!(resolution, Resolution::NotImplemented { driver: "air" }));
        assert_eq!(resolution.raw_text(), "Driver Not Implemented.");
    }

    #[tokio::test]
    async fn launch_failure_is_classified() {
        let driver = MockDriver::returning("air", "never runs");
        let launcher = MockLauncher::failing();
        let resolver = Resolver::new(
            MockFastPath::miss(MissReason::NotFound),
            launcher.clone(),
            table(Arc::new(driver.clone())),
        );

        let resolution = resolver.resolve(&air_request("17612345678")).await;

        assert_eq!(resolution.source_tag(), BROWSER_SOURCE_TAG);
        assert!(driver.calls().is_empty());
        assert_eq!(launcher.closes(), 0);
    }

    #[tokio::test]
    async fn sea_request_with_unknown_hint_uses_sea_fallback() {
        let sea_fallback = MockDriver::returning("sea_fallback", "MSCU1234567 discharged at Jebel Ali on 14 Oct");
        let routes = RouteTable::builder(MockDriver::named("air"), Arc::new(sea_fallback.clone()))
            .sea("hapag", MockDriver::named("hapag_lloyd"))
            .sea("cma", MockDriver::named("cma_cgm"))
            .build()
            .unwrap();
        let resolver = Resolver::new(MockFastPath::miss(MissReason::NotFound), MockLauncher::new(), routes);
        let request = TrackingRequest::new("MSCU1234567", Mode::Sea, "MSC Mediterranean").unwrap();

        let resolution = resolver.resolve(&request).await;

        assert_eq!(resolution.source_tag(), "sea_fallback");
        assert_eq!(sea_fallback.calls(), vec!["MSCU1234567".to_string()]);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "driver panicked");
    }
}
