//! Router behaviour that does not need a database.
//!
//! Run with: cargo test -p solemate-integration-tests

use axum::http::{Method, StatusCode};
use serde_json::json;

use solemate_integration_tests::{TestClient, offline_app};

fn client() -> TestClient {
    TestClient::new(offline_app(), "203.0.113.10")
}

#[tokio::test]
async fn test_health_is_ok() {
    let resp = client().get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!("ok"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let mut client = client();

    let resp = client.get("/nope").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.message(), "Route not found");

    let resp = client.get("/api/does-not-exist").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.body["success"], json!(false));
}

#[tokio::test]
async fn test_customer_routes_require_login() {
    let mut client = client();

    for (method, path) in [
        (Method::GET, "/api/cart"),
        (Method::GET, "/api/cart/count"),
        (Method::GET, "/api/orders"),
        (Method::GET, "/api/account"),
        (Method::GET, "/api/auth/me"),
    ] {
        let resp = client.send(method, path, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{path}");
        assert!(!resp.message().is_empty());
    }

    let resp = client
        .post(
            "/api/cart/add",
            json!({"product_id": 1, "size": "42", "quantity": 1}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    let mut client = client();

    let resp = client.get("/api/admin/dashboard").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = client.delete("/api/admin/products/1").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_errors_are_400() {
    let mut client = client();

    let resp = client
        .post(
            "/api/auth/register",
            json!({"name": "Sam", "phone": "call me", "password": "long enough pass"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = client
        .post(
            "/api/auth/register",
            json!({"name": "Sam", "phone": "+15550100", "password": "short"}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.message().contains("password"));
    assert!(!client.has_session());
}

#[tokio::test]
async fn test_malformed_json_is_400_envelope() {
    let resp = client()
        .post("/api/auth/login", json!({"phone": "+15550100"}))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["success"], json!(false));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let mut client = client();

    for path in ["/health", "/nope"] {
        let resp = client.get(path).await;
        assert_eq!(resp.headers["x-content-type-options"], "nosniff", "{path}");
        assert_eq!(resp.headers["x-frame-options"], "DENY", "{path}");
        assert!(resp.headers.contains_key("content-security-policy"));
        // Plain http base URL, so no HSTS.
        assert!(!resp.headers.contains_key("strict-transport-security"));
    }
}

#[tokio::test]
async fn test_request_id_is_generated_per_request() {
    let mut client = client();

    let resp = client.get("/health").await;
    let generated = resp.headers["x-request-id"].to_str().unwrap_or_default();
    assert!(!generated.is_empty());

    let resp = client.get("/health").await;
    assert_ne!(resp.headers["x-request-id"], generated);
}

#[tokio::test]
async fn test_auth_rate_limit() {
    let mut client = client();
    let body = json!({"name": "", "phone": "+15550100", "password": "long enough pass"});

    let mut statuses = Vec::new();

    let mut limited = None;
    for _ in 0..8 {
        let resp = client.post("/api/auth/register", body.clone()).await;
        statuses.push(resp.status);
        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            limited = Some(resp);
        }
    }

    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::BAD_REQUEST));
    let limited = limited.expect("expected a 429 response");
    assert_eq!(limited.body["success"], json!(false));
    assert!(!limited.message().is_empty());
    assert!(limited.headers.contains_key("retry-after"));
}
