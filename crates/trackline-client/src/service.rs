use std::sync::Arc;

use trackline_core::{AppError, Resolver, RouteTable, StatusInterpreter, TrackingService};

use crate::cargoes::CargoesFlowClient;
use crate::cleaner::HtmdCleaner;
use crate::config::TracklineConfig;
use crate::llm::OpenAiStatusModel;
use crate::vision::OpenAiVisionSolver;

#[cfg(feature = "browser")]
pub type Launcher = crate::chromium::ChromiumLauncher;

#[cfg(not(feature = "browser"))]
pub type Launcher = trackline_core::UnavailableLauncher;

/// The production pipeline: Cargoes Flow, Chromium, OpenAI, htmd.
pub type DefaultTracker =
    TrackingService<CargoesFlowClient, Launcher, OpenAiStatusModel, HtmdCleaner>;

#[cfg(feature = "browser")]
fn launcher(config: &TracklineConfig) -> Launcher {
    crate::chromium::ChromiumLauncher::new(config.headless).with_chrome_bin(config.chrome_bin.clone())
}

#[cfg(not(feature = "browser"))]
fn launcher(_config: &TracklineConfig) -> Launcher {
    tracing::warn!("Built without the `browser` feature, carrier websites will not be visited");
    trackline_core::UnavailableLauncher
}

/// Wire every production component from `config`.
pub fn build_tracker(config: &TracklineConfig) -> Result<DefaultTracker, AppError> {
    let fast_path = CargoesFlowClient::new(&config.cargoes_api_key, &config.cargoes_org_token)?
        .with_endpoint(&config.cargoes_endpoint)
        .with_timeout(config.api_timeout)?;

    let solver = OpenAiVisionSolver::with_base_url(
        &config.openai_api_key,
        &config.vision_model,
        &config.llm_base_url,
    )?;
    let routes = RouteTable::standard(Arc::new(solver))?;

    let model =
        OpenAiStatusModel::with_base_url(&config.openai_api_key, &config.model, &config.llm_base_url)?;

    Ok(TrackingService::new(
        Resolver::new(fast_path, launcher(config), routes),
        StatusInterpreter::new(model, HtmdCleaner::new()),
    ))
}
