use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trackline API",
        version = "0.1.0",
        description = "Shipment tracking across a hosted aggregation API and carrier websites, with LLM status interpretation."
    ),
    paths(
        crate::routes::track_single,
        crate::routes::track_batch,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::TrackRequest,
        crate::dto::TrackResponse,
        crate::dto::BatchRequest,
        crate::dto::BatchResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "tracking", description = "Shipment status lookups"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
