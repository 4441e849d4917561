//! Common Test Utilities
//!
//! Shared helpers for integration tests that do not require a database.

use axum::{body::Body, http::Request, routing::get, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;

use chat_gateway::application::Claims;
use chat_gateway::presentation::http::handlers::health;

/// Shared secret used by token-based tests.
pub const TEST_SECRET: &str = "integration-test-secret-32-chars!!";

/// Mint a bearer token the way the external issuer would.
pub fn mint_token(user_id: i64, ttl: Duration) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("token encoding")
}

/// Router exposing only the state-free operational endpoints.
pub fn operational_router() -> Router {
    Router::new().route("/health", get(health::liveness))
}

/// Make a GET request against a router.
pub async fn get_response(router: Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}
