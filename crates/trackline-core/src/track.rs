use crate::browser::BrowserLauncher;
use crate::interpret::StatusInterpreter;
use crate::models::{TrackingReport, TrackingRequest};
use crate::resolve::Resolver;
use crate::traits::{Cleaner, FastPath, StatusModel, Tracker};

/// Full pipeline: resolve → interpret → report.
///
/// Generic over every external dependency so the HTTP and CLI surfaces can
/// share one implementation, and tests can run it without network or
/// browser.
pub struct TrackingService<F, L, M, C>
where
    F: FastPath,
    L: BrowserLauncher,
    M: StatusModel,
    C: Cleaner,
{
    resolver: Resolver<F, L>,
    interpreter: StatusInterpreter<M, C>,
}

impl<F, L, M, C> Clone for TrackingService<F, L, M, C>
where
    F: FastPath,
    L: BrowserLauncher,
    M: StatusModel,
    C: Cleaner,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            interpreter: self.interpreter.clone(),
        }
    }
}

impl<F, L, M, C> TrackingService<F, L, M, C>
where
    F: FastPath,
    L: BrowserLauncher,
    M: StatusModel,
    C: Cleaner,
{
    pub fn new(resolver: Resolver<F, L>, interpreter: StatusInterpreter<M, C>) -> Self {
        Self {
            resolver,
            interpreter,
        }
    }

    /// Run one request end to end. Never fails: every problem is folded
    /// into the report's status fields.
    pub async fn run(&self, request: TrackingRequest) -> TrackingReport {
        let resolution = self.resolver.resolve(&request).await;
        let record = self
            .interpreter
            .interpret_resolution(&resolution, &request.carrier_hint)
            .await;

        tracing::info!(
            identifier = %request.identifier,
            source = resolution.source_tag(),
            status = %record.status,
            "Tracking complete"
        );
        TrackingReport::new(&request, &resolution, record)
    }
}

impl<F, L, M, C> Tracker for TrackingService<F, L, M, C>
where
    F: FastPath + 'static,
    L: BrowserLauncher + 'static,
    M: StatusModel + 'static,
    C: Cleaner + 'static,
{
    async fn track(&self, request: TrackingRequest) -> TrackingReport {
        self.run(request).await
    }

    fn browser_enabled(&self) -> bool {
        self.resolver.browser_available()
    }
}
