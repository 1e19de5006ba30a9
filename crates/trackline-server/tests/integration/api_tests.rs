use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use trackline_core::Mode;
use trackline_core::testutil::MockTracker;

use crate::integration::common::{
    delivered, json_body, post_json, send, setup_test_app, setup_test_app_with,
};

#[tokio::test]
async fn health_reports_browser_state() {
    let app = setup_test_app();
    let response = send(app.router, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["browser"], "enabled");

    let app = setup_test_app_with(MockTracker::new(delivered()).without_browser());
    let response = send(app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(json_body(response).await["browser"], "disabled");
}

#[tokio::test]
async fn single_returns_original_wire_names() {
    let app = setup_test_app();
    let response = send(
        app.router,
        post_json(
            "/track/single",
            json!({"tracking_number": "176-1234 5678", "carrier": "Emirates"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["tracking_number"], "176-1234 5678");
    assert_eq!(json["carrier"], "Emirates");
    assert_eq!(json["status"], "Delivered");
    assert_eq!(json["live_eta"], "14-Oct-2026");
    assert_eq!(json["smart_summary"], "Delivered to consignee in Chicago.");
    assert_eq!(json["raw_data_snippet"], "raw tracking data for 17612345678");

    let requests = app.tracker.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].mode, Mode::Air);
    assert_eq!(requests[0].identifier.normalized(), "17612345678");
}

#[tokio::test]
async fn single_sea_request_carries_carrier_hint() {
    let app = setup_test_app();
    let response = send(
        app.router,
        post_json(
            "/track/single",
            json!({"tracking_number": "HLXU1234567", "carrier": "HAPAG-LLOYD", "type": "SEA"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let requests = app.tracker.requests();
    assert_eq!(requests[0].mode, Mode::Sea);
    assert_eq!(requests[0].carrier_hint, "HAPAG-LLOYD");
}

#[tokio::test]
async fn single_rejects_unknown_type() {
    let app = setup_test_app();
    let response = send(
        app.router,
        post_json("/track/single", json!({"tracking_number": "MSCU1234567", "type": "rail"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "validation_error");
    assert!(app.tracker.requests().is_empty());
}

#[tokio::test]
async fn single_rejects_blank_number() {
    let app = setup_test_app();
    let response = send(
        app.router,
        post_json("/track/single", json!({"tracking_number": "   "})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_preserves_order() {
    let app = setup_test_app();
    let shipments: Vec<_> = (0..7)
        .map(|i| json!({"tracking_number": format!("MSCU123456{i}"), "type": "sea"}))
        .collect();

    let response = send(app.router, post_json("/track/batch", json!({"shipments": shipments}))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 7);
    let numbers: Vec<_> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["tracking_number"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<_> = (0..7).map(|i| format!("MSCU123456{i}")).collect();
    assert_eq!(numbers, expected);
    assert_eq!(app.tracker.requests().len(), 7);
}

#[tokio::test]
async fn batch_rejects_empty_list() {
    let app = setup_test_app();
    let response = send(app.router, post_json("/track/batch", json!({"shipments": []}))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_with_one_bad_item_tracks_nothing() {
    let app = setup_test_app();
    let response = send(
        app.router,
        post_json(
            "/track/batch",
            json!({"shipments": [
                {"tracking_number": "MSCU1234567", "type": "sea"},
                {"tracking_number": "", "type": "sea"}
            ]}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().starts_with("shipments[1]"));
    assert!(app.tracker.requests().is_empty());
}

#[tokio::test]
async fn openapi_document_lists_tracking_paths() {
    let app = setup_test_app();
    let response = send(
        app.router,
        Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/track/single"].is_object());
    assert!(json["paths"]["/track/batch"].is_object());
    assert!(json["paths"]["/health"].is_object());
}
