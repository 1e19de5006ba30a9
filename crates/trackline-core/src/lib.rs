pub mod browser;
pub mod challenge;
pub mod drivers;
pub mod error;
pub mod evasion;
pub mod extract;
pub mod interpret;
pub mod models;
pub mod resolve;
pub mod routing;
pub mod track;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use browser::{BrowserLauncher, BrowserSession, Frame, Locator, Page, UnavailableLauncher};
pub use drivers::Driver;
pub use error::AppError;
pub use interpret::StatusInterpreter;
pub use models::{
    AcquisitionResult, Identifier, Mode, Resolution, StatusRecord, TrackingReport,
    TrackingRequest,
};
pub use resolve::Resolver;
pub use routing::RouteTable;
pub use track::TrackingService;
pub use traits::{
    CaptchaSolver, Cleaner, FastPath, FastPathOutcome, MissReason, StatusModel, Tracker,
};
