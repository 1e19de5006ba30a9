use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use trackline_core::StatusRecord;
use trackline_core::testutil::MockTracker;
use trackline_server::routes;
use trackline_server::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub tracker: MockTracker,
}

pub fn delivered() -> StatusRecord {
    StatusRecord::new("14-Oct-2026", "Delivered", "Delivered to consignee in Chicago.")
}

/// Router backed by `tracker`.
pub fn setup_test_app_with(tracker: MockTracker) -> TestApp {
    let state = Arc::new(AppState::new(tracker.clone()).with_batch_concurrency(3));
    TestApp {
        router: routes::router(state),
        tracker,
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(MockTracker::new(delivered()))
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
