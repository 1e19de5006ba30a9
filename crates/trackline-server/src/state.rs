use trackline_core::Tracker;

/// Default number of batch items tracked at the same time.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 2;

/// Shared application state, available to all route handlers via `State<Arc<AppState<T>>>`.
pub struct AppState<T: Tracker> {
    pub tracker: T,
    /// Each in-flight item owns its own browser session.
    pub batch_concurrency: usize,
}

impl<T: Tracker> AppState<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }
}
