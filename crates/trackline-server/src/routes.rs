use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures::StreamExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use trackline_core::Tracker;

use crate::dto::{BatchRequest, BatchResponse, HealthResponse, TrackRequest, TrackResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes.
pub fn router<T: Tracker>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/track/single", post(track_single::<T>))
        .route("/track/batch", post(track_batch::<T>))
        .route("/health", get(health::<T>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/track/single",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Interpreted shipment status", body = TrackResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "tracking"
)]
pub async fn track_single<T: Tracker>(
    State(state): State<Arc<AppState<T>>>,
    axum::Json(body): axum::Json<TrackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.into_request()?;
    let report = state.tracker.track(request).await;
    Ok(axum::Json(TrackResponse::from(report)))
}

#[utoipa::path(
    post,
    path = "/track/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "One result per shipment, in request order", body = BatchResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
    ),
    tag = "tracking"
)]
pub async fn track_batch<T: Tracker>(
    State(state): State<Arc<AppState<T>>>,
    axum::Json(body): axum::Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = body.into_requests()?;
    tracing::info!(
        items = requests.len(),
        concurrency = state.batch_concurrency,
        "Tracking batch"
    );

    let tracker = &state.tracker;
    let results: Vec<TrackResponse> = futures::stream::iter(requests)
        .map(|request| tracker.track(request))
        .buffered(state.batch_concurrency)
        .map(TrackResponse::from)
        .collect()
        .await;

    Ok(axum::Json(BatchResponse {
        total: results.len(),
        results,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<T: Tracker>(State(state): State<Arc<AppState<T>>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        browser: if state.tracker.browser_enabled() {
            "enabled"
        } else {
            "disabled"
        },
    })
}
