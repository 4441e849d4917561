//! Health Endpoint Tests

use axum::body::to_bytes;
use axum::http::StatusCode;

use crate::common::{get_response, operational_router};

#[tokio::test]
async fn liveness_reports_ok_with_version() {
    let response = get_response(operational_router(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = get_response(operational_router(), "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
