pub mod cargoes;
#[cfg(feature = "browser")]
pub mod chromium;
pub mod cleaner;
pub mod config;
pub mod llm;
pub mod service;
pub mod vision;

pub use cargoes::CargoesFlowClient;
#[cfg(feature = "browser")]
pub use chromium::ChromiumLauncher;
pub use cleaner::HtmdCleaner;
pub use config::TracklineConfig;
pub use llm::OpenAiStatusModel;
pub use service::{DefaultTracker, build_tracker};
pub use vision::OpenAiVisionSolver;
