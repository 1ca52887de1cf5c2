//! Rate limiting tests
//!
//! These tests run the full router with tightened quotas and verify:
//! - Per-user, per-endpoint budgets for authenticated traffic
//! - Per-address budgets for anonymous traffic
//! - The coarse per-address budget spanning all metered endpoints
//! - Quota headers on success and 429 responses
//!
//! Functional setup (registration, helper logins) is charged to a separate
//! forwarded address by the common helpers, so the addresses used here
//! start with clean counters.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::Utc;
use common::{bare_request, body_json, json_request, test_config, TestContext};
use serde_json::json;

fn quota_header(response: &Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
        .to_string()
}

/// An authenticated user exhausts one endpoint's budget without touching
/// other endpoints or other users.
#[tokio::test]
async fn authenticated_quota_is_per_user_and_endpoint() {
    let mut config = test_config();
    config.rate_limit.per_minute = 3;
    let ctx = TestContext::with_config(config).await;
    let (_, member_token) = ctx.create_member("carol").await;

    for expected_remaining in ["2", "1", "0"] {
        let response = ctx
            .send(bare_request("GET", "/api/v1/users", Some(&ctx.access_token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(quota_header(&response, "X-RateLimit-Limit"), "3");
        assert_eq!(
            quota_header(&response, "X-RateLimit-Remaining"),
            expected_remaining
        );
    }

    let denied = ctx
        .send(bare_request("GET", "/api/v1/users", Some(&ctx.access_token)))
        .await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(quota_header(&denied, "X-RateLimit-Limit"), "3");
    assert_eq!(quota_header(&denied, "X-RateLimit-Remaining"), "0");

    let retry_after: u64 = quota_header(&denied, "Retry-After").parse().unwrap();
    assert!((1..=61).contains(&retry_after));
    let reset_at: i64 = quota_header(&denied, "X-RateLimit-Reset").parse().unwrap();
    let now = Utc::now().timestamp();
    assert!(reset_at >= now && reset_at <= now + 61);

    let body = body_json(denied).await;
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Rate limit exceeded. Try again in"));

    // Same user, different endpoint: separate budget
    let other_endpoint = ctx
        .send(bare_request("GET", "/api/v1/files", Some(&ctx.access_token)))
        .await;
    assert_eq!(other_endpoint.status(), StatusCode::OK);

    // Different user, exhausted endpoint: separate budget
    let other_user = ctx
        .send(bare_request("GET", "/api/v1/users", Some(&member_token)))
        .await;
    assert_eq!(other_user.status(), StatusCode::OK);
}

/// Anonymous traffic is limited per client address, not globally.
#[tokio::test]
async fn anonymous_quota_is_per_address() {
    let mut config = test_config();
    config.rate_limit.anonymous_per_minute = 2;
    let ctx = TestContext::with_config(config).await;

    let attempt = json!({
        "tenant": "acme",
        "username": "alice",
        "password": "wrong-password",
    });

    // Unattributed requests share the fallback address bucket
    for _ in 0..2 {
        let response = ctx
            .send(json_request("POST", "/auth/login", None, &attempt))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let denied = ctx
        .send(json_request("POST", "/auth/login", None, &attempt))
        .await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(quota_header(&denied, "X-RateLimit-Limit"), "2");

    // A different forwarded address has its own budget
    let forwarded = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::from(attempt.to_string()))
        .unwrap();
    let response = ctx.send(forwarded).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// The coarse address budget counts every metered endpoint and runs before
/// authentication.
#[tokio::test]
async fn address_quota_spans_endpoints() {
    let mut config = test_config();
    config.rate_limit.ip_per_minute = 5;
    let ctx = TestContext::with_config(config).await;

    let uris = [
        "/api/v1/users",
        "/api/v1/files",
        "/api/v1/admin/tenant",
        "/api/v1/users",
        "/api/v1/admin/stats",
    ];
    for uri in uris {
        let response = ctx
            .send(bare_request("GET", uri, Some(&ctx.access_token)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        // Success headers come from the identity limiter, not the address one
        assert_eq!(quota_header(&response, "X-RateLimit-Limit"), "1000");
    }

    // Sixth request from the same address: denied before authentication
    // even runs, so no token is needed to see the 429
    let denied = ctx.send(bare_request("GET", "/api/v1/files", None)).await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(quota_header(&denied, "X-RateLimit-Limit"), "5");

    // Health stays reachable; it is not metered
    let health = ctx.send(bare_request("GET", "/health", None)).await;
    assert_eq!(health.status(), StatusCode::OK);

    // Another address is unaffected
    let forwarded = Request::builder()
        .method("GET")
        .uri("/api/v1/users")
        .header("authorization", ctx.auth_header())
        .header("x-forwarded-for", "203.0.113.80")
        .body(Body::empty())
        .unwrap();
    let response = ctx.send(forwarded).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Allowed responses always expose the current quota state.
#[tokio::test]
async fn successful_responses_carry_quota_headers() {
    let ctx = TestContext::new().await;

    let first = ctx
        .send(bare_request("GET", "/api/v1/users", Some(&ctx.access_token)))
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(quota_header(&first, "X-RateLimit-Limit"), "1000");
    assert_eq!(quota_header(&first, "X-RateLimit-Remaining"), "999");
    let reset_at: i64 = quota_header(&first, "X-RateLimit-Reset").parse().unwrap();
    let now = Utc::now().timestamp();
    assert!(reset_at >= now && reset_at <= now + 61);

    let second = ctx
        .send(bare_request("GET", "/api/v1/users", Some(&ctx.access_token)))
        .await;
    assert_eq!(quota_header(&second, "X-RateLimit-Remaining"), "998");

    // Public endpoints report the anonymous quota
    let login = ctx
        .send(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({
                "tenant": "acme",
                "username": "alice",
                "password": common::ADMIN_PASSWORD,
            }),
        ))
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(quota_header(&login, "X-RateLimit-Limit"), "1000");
    assert_eq!(quota_header(&login, "X-RateLimit-Remaining"), "999");
}

/// Traffic creates tracked buckets; recent ones survive housekeeping.
#[tokio::test]
async fn housekeeping_retains_active_buckets() {
    let ctx = TestContext::new().await;

    let response = ctx
        .send(bare_request("GET", "/api/v1/users", Some(&ctx.access_token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Setup traffic plus the request above have registered several buckets
    let tracked = ctx.state.limiter.tracked_keys();
    assert!(tracked >= 4, "expected several tracked buckets, got {}", tracked);

    // Everything is fresh, so the housekeeping sweep keeps it all
    let removed = ctx.state.limiter.purge_idle(chrono::Duration::minutes(10));
    assert_eq!(removed, 0);
    assert_eq!(ctx.state.limiter.tracked_keys(), tracked);
}
