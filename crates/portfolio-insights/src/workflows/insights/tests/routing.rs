use super::common::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::insights::router::insight_router;

fn router(harness: &Harness) -> Router {
    insight_router(Arc::new(harness.engine()))
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn pass_body() -> Value {
    json!({
        "snapshots": [
            {
                "property_id": "prop-a",
                "property_name": "Dune House",
                "metric_type": "occupancy",
                "property_value": 40.0,
                "portfolio_average": 60.0,
                "comparison_period": "30d"
            },
            {
                "property_id": "prop-b",
                "property_name": "Harbor Loft",
                "metric_type": "pricing",
                "property_value": 115.0,
                "portfolio_average": 100.0,
                "comparison_period": "30d"
            },
            {
                "property_id": "prop-c",
                "metric_type": "occupancy",
                "property_value": 10.0,
                "portfolio_average": 0.0,
                "comparison_period": "7d"
            }
        ]
    })
}

async fn seed(router: &Router) -> Value {
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/insights/passes",
            pass_body(),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    read_json_body(response).await
}

#[tokio::test]
async fn pass_route_reports_summary() {
    let harness = Harness::new();
    let router = router(&harness);

    let summary = seed(&router).await;

    assert_eq!(summary["created"], 2);
    assert_eq!(summary["non_evaluable"], 1);
    assert_eq!(summary["properties"], 3);
}

#[tokio::test]
async fn malformed_snapshot_is_rejected_without_failing_the_pass() {
    let harness = Harness::new();
    let router = router(&harness);
    let mut body = pass_body();
    body["snapshots"]
        .as_array_mut()
        .expect("snapshots array")
        .extend([
            json!({
                "property_id": "prop-d",
                "metric_type": "occupancy",
                "property_value": null,
                "portfolio_average": 60.0,
                "comparison_period": "30d"
            }),
            json!({
                "property_id": "prop-e",
                "metric_type": "revenue",
                "property_value": 10.0,
                "portfolio_average": 60.0,
                "comparison_period": "30d"
            }),
        ]);

    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/insights/passes", body))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let summary = read_json_body(response).await;

    assert_eq!(summary["created"], 2);
    assert_eq!(summary["properties"], 3);
    assert_eq!(summary["rejected"], 2);
    assert_eq!(harness.store.open_count().expect("count"), 2);
}

#[tokio::test]
async fn active_list_is_ordered_and_filterable() {
    let harness = Harness::new();
    let router = router(&harness);
    seed(&router).await;

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/insights"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], 2);
    assert_eq!(payload["insights"][0]["severity"], "critical");
    assert_eq!(payload["insights"][0]["type"], "occupancy");
    assert_eq!(payload["insights"][1]["severity"], "warning");
    assert_eq!(
        payload["insights"][1]["actions"][0]["kind"],
        "open_pricing"
    );

    let response = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/insights?type=pricing&period=30d",
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], 1);
    assert_eq!(payload["insights"][0]["property_id"], "prop-b");
}

#[tokio::test]
async fn read_and_archive_routes_update_lifecycle() {
    let harness = Harness::new();
    let router = router(&harness);
    seed(&router).await;

    let unread = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/insights/unread-count"))
        .await
        .expect("route executes");
    assert_eq!(read_json_body(unread).await["unread"], 2);

    let active = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/insights?property_id=prop-b"))
        .await
        .expect("route executes");
    let id = read_json_body(active).await["insights"][0]["id"]
        .as_str()
        .expect("insight id")
        .to_string();

    let read = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/insights/{id}/read"),
        ))
        .await
        .expect("route executes");
    assert_eq!(read.status(), StatusCode::OK);
    assert_eq!(read_json_body(read).await["status"], "read");

    let archived = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/insights/{id}/archive"),
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(archived).await;
    assert_eq!(payload["status"], "archived");
    assert!(payload.get("archived_at").is_some());

    let archived_list = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/insights/archived"))
        .await
        .expect("route executes");
    assert_eq!(read_json_body(archived_list).await["total"], 1);

    let unread = router
        .oneshot(empty_request(Method::GET, "/api/v1/insights/unread-count"))
        .await
        .expect("route executes");
    assert_eq!(read_json_body(unread).await["unread"], 1);
}

#[tokio::test]
async fn unknown_insight_returns_not_found() {
    let harness = Harness::new();
    let router = router(&harness);

    for (method, uri) in [
        (Method::GET, "/api/v1/insights/ins-999999"),
        (Method::POST, "/api/v1/insights/ins-999999/read"),
        (Method::POST, "/api/v1/insights/ins-999999/archive"),
    ] {
        let response = router
            .clone()
            .oneshot(empty_request(method, uri))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload = read_json_body(response).await;
        assert!(payload["error"]
            .as_str()
            .expect("error message")
            .contains("ins-999999"));
    }
}

#[tokio::test]
async fn threshold_routes_validate_updates() {
    let harness = Harness::new();
    let router = router(&harness);

    let current = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/insights/thresholds"))
        .await
        .expect("route executes");
    let payload = read_json_body(current).await;
    assert_eq!(payload["occupancy_difference_percent"], 10.0);
    assert_eq!(payload["closed_days_threshold"], 7);

    let rejected = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/insights/thresholds",
            json!({ "pricing_difference_percent": 0.0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let accepted = router
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/insights/thresholds",
            json!({ "pricing_difference_percent": 20.0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(accepted.status(), StatusCode::OK);
    let payload = read_json_body(accepted).await;
    assert_eq!(payload["pricing_difference_percent"], 20.0);
    assert_eq!(payload["occupancy_difference_percent"], 10.0);
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let harness = Harness::new();
    let response = router(&harness)
        .oneshot(empty_request(Method::GET, "/api/v1/insights"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], 0);
    assert_eq!(payload["insights"], json!([]));
}
