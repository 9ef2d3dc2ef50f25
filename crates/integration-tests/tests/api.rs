//! Router-level tests: middleware, authentication gates and endpoints that
//! answer without touching the database.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{StatusCode, header};
use milletmart_core::UserRole;
use milletmart_integration_tests::{
    TestApp, json_body, request, sign_webhook, text_body,
};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "ok");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new();
    for uri in ["/health", "/api/nope"] {
        let response = app.get(uri).await;
        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY", "{uri}");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff", "{uri}");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer", "{uri}");
        assert!(
            headers[header::CONTENT_SECURITY_POLICY]
                .to_str()
                .unwrap()
                .starts_with("default-src 'none'"),
            "{uri}"
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-store", "{uri}");
    }
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let app = TestApp::new();

    let response = app.get("/health").await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let response = app
        .send(
            request("GET", "/health", None)
                .header("x-request-id", "edge.7f3a-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "edge.7f3a-01");

    let response = app
        .send(
            request("GET", "/health", None)
                .header("x-request-id", "<script>")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_ne!(response.headers()["x-request-id"], "<script>");
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_origin() {
    let app = TestApp::new();
    let response = app
        .send(
            request("OPTIONS", "/api/cart/items", None)
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_cors_ignores_other_origins() {
    let app = TestApp::new();
    let response = app
        .send(
            request("GET", "/health", None)
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

#[tokio::test]
async fn test_empty_guest_cart() {
    let app = TestApp::new();
    let response = app.get("/api/cart").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cart = json_body(response).await;
    assert_eq!(cart["lines"], serde_json::json!([]));
    assert_eq!(cart["item_count"], 0);
    let total: Decimal = cart["total"]["amount"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::ZERO);
    let shipping: Decimal = cart["shipping_fee"]["amount"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(shipping, Decimal::ZERO);
    assert!(cart.get("adjustments").is_none());
}

#[tokio::test]
async fn test_order_routes_require_sign_in() {
    let app = TestApp::new();

    let response = app.get("/api/orders").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Sign in required");

    let response = app
        .send(
            request("POST", "/api/orders", None)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/account/addresses").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_authorization_is_treated_as_anonymous() {
    let app = TestApp::new();
    let response = app
        .send(
            request("GET", "/api/orders", None)
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_refuse_customers() {
    let app = TestApp::new();

    let response = app.get("/api/admin/dashboard").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = app.sign_in("asha@example.com", UserRole::Customer).await;
    for uri in [
        "/api/admin/dashboard",
        "/api/admin/orders",
        "/api/admin/products",
        "/api/admin/combos",
    ] {
        let response = app.get_as(uri, &token).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(json_body(response).await["error"], "Admin access required");
    }
}

#[tokio::test]
async fn test_admin_status_update_refuses_customers() {
    let app = TestApp::new();
    let token = app.sign_in("asha@example.com", UserRole::Customer).await;
    let response = app
        .send(
            request("POST", "/api/admin/orders/7/status", Some(&token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"status":"SHIPPED"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sign_out_drops_cached_token() {
    let app = TestApp::new();
    let token = app.sign_in("asha@example.com", UserRole::Customer).await;
    assert_eq!(
        app.get_as("/api/admin/dashboard", &token).await.status(),
        StatusCode::FORBIDDEN
    );

    let response = app
        .send(
            request("POST", "/api/account/sign-out", Some(&token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The token now has to be checked with the provider, which tests cannot reach
    let response = app.get_as("/api/admin/dashboard", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_sign_out_requires_sign_in() {
    let app = TestApp::new();
    let response = app
        .send(
            request("POST", "/api/account/sign-out", None)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_requires_signature() {
    let app = TestApp::new();
    let body = r#"{"event":"payment.captured","payload":{}}"#;

    let response = app
        .send(
            request("POST", "/api/payments/webhook", None)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing webhook signature");

    let response = app
        .send(
            request("POST", "/api/payments/webhook", None)
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-razorpay-signature", "00ff")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_signature_covers_exact_body() {
    let app = TestApp::new();
    let signed = r#"{"event":"order.paid"}"#;
    let tampered = r#"{"event":"order.paid" }"#;

    let response = app
        .send(
            request("POST", "/api/payments/webhook", None)
                .header("x-razorpay-signature", sign_webhook(signed.as_bytes()))
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_unhandled_webhook_is_acknowledged() {
    let app = TestApp::new();
    let body = r#"{"event":"order.paid","payload":{}}"#;

    let response = app
        .send(
            request("POST", "/api/payments/webhook", None)
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-razorpay-signature", sign_webhook(body.as_bytes()))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_signed_malformed_webhook_is_rejected() {
    let app = TestApp::new();
    let body = "not json";

    let response = app
        .send(
            request("POST", "/api/payments/webhook", None)
                .header("x-razorpay-signature", sign_webhook(body.as_bytes()))
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
