//! Carrier drivers.
//!
//! Each driver walks one website through the same phases: navigate,
//! dismiss interstitials, populate inputs, submit, then settle and extract.
//! Drivers never open or close browser sessions; the page they receive is
//! owned by the resolver.

mod af_klm;
mod air_india;
mod china_airlines;
mod cma_cgm;
mod etihad;
mod hapag_lloyd;
mod saudia;
mod silk_way;
mod track_trace;

use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{Locator, Page, WaitOutcome, WaitTarget};
use crate::error::AppError;
use crate::models::Identifier;

pub use af_klm::AfKlm;
pub use air_india::AirIndia;
pub use china_airlines::ChinaAirlines;
pub use cma_cgm::CmaCgm;
pub use etihad::Etihad;
pub use hapag_lloyd::HapagLloyd;
pub use saudia::Saudia;
pub use silk_way::SilkWay;
pub use track_trace::TrackTrace;

/// Default navigation bound for carrier entry pages.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound on waiting for a form control to become visible.
pub const INPUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives one carrier website from entry URL to raw result text.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Stable snake_case name, used as the result's source tag.
    fn name(&self) -> &'static str;

    /// Run the site's phases for `identifier` on `page`.
    ///
    /// An empty string means the driver produced nothing; the resolver
    /// reports that as "not implemented" rather than as a failure.
    async fn drive(&self, page: &dyn Page, identifier: &Identifier) -> Result<String, AppError>;
}

/// Wait for a form control; a control that never shows up fails the driver.
pub(crate) async fn require_visible(
    driver: &'static str,
    page: &dyn Page,
    locator: Locator,
    timeout: Duration,
) -> Result<(), AppError> {
    match page.wait_for(&WaitTarget::Visible(locator), timeout).await? {
        WaitOutcome::Matched => Ok(()),
        WaitOutcome::TimedOut => Err(AppError::site(
            driver,
            format!("{locator} did not appear within {}s", timeout.as_secs()),
        )),
    }
}
