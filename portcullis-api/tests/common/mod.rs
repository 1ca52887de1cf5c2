//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An app instance over the in-memory store with a known configuration
//! - A seeded tenant ("acme") with a logged-in admin ("alice")
//! - Request builders and response helpers
//!
//! Setup traffic (registration, logins issued by helpers) is charged to a
//! dedicated forwarded address so tests that exhaust rate quotas start from
//! clean counters.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use portcullis_api::app::{build_router, AppState};
use portcullis_api::config::{
    ApiConfig, Config, DatabaseConfig, JwtConfig, PaginationConfig, RateLimitConfig, StoreConfig,
    UploadConfig,
};
use portcullis_core::store::{memory::MemoryStore, Bounded};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::Service as _;
use uuid::Uuid;

/// Password given to the seeded admin user.
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

/// Forwarded address used by setup helpers, distinct from the address test
/// requests resolve to.
pub const SETUP_ADDRESS: &str = "10.0.0.250";

/// Configuration the test app runs with.
///
/// Quotas are generous so functional tests never trip the limiters; rate
/// limit tests tighten them through [`TestContext::with_config`].
pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            environment: "test".to_string(),
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "memory://".to_string(),
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            previous_secret: None,
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
        },
        rate_limit: RateLimitConfig {
            per_minute: 1_000,
            anonymous_per_minute: 1_000,
            ip_per_minute: 100_000,
        },
        store: StoreConfig { timeout_ms: 2_000 },
        pagination: PaginationConfig {
            default_page_size: 20,
            max_page_size: 100,
        },
        uploads: UploadConfig {
            max_file_size_mb: 1,
            allowed_file_types: vec![
                "text/plain".to_string(),
                "image/png".to_string(),
                "application/pdf".to_string(),
            ],
        },
    }
}

/// Test context: the app plus the seeded tenant and admin session
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub tenant_id: Uuid,
    pub admin_user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestContext {
    /// Creates a context with the default test configuration.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Creates a context with a custom configuration, then registers tenant
    /// "acme" with admin "alice" and logs the admin in.
    pub async fn with_config(config: Config) -> Self {
        let store = Arc::new(Bounded::new(MemoryStore::new(), Duration::from_secs(2)));
        let state = AppState::new(store.clone(), store, config);
        let app = build_router(state.clone());

        let mut ctx = TestContext {
            app,
            state,
            tenant_id: Uuid::nil(),
            admin_user_id: Uuid::nil(),
            access_token: String::new(),
            refresh_token: String::new(),
        };

        let response = ctx
            .send(setup_json_request(
                "POST",
                "/auth/register",
                None,
                &json!({
                    "tenant_name": "acme",
                    "admin_email": "alice@acme.example",
                    "admin_username": "alice",
                    "admin_password": ADMIN_PASSWORD,
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        ctx.tenant_id = body["tenant_id"].as_str().unwrap().parse().unwrap();
        ctx.admin_user_id = body["admin_user_id"].as_str().unwrap().parse().unwrap();

        let (access, refresh) = ctx.login("acme", "alice", ADMIN_PASSWORD).await;
        ctx.access_token = access;
        ctx.refresh_token = refresh;

        ctx
    }

    /// Sends one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().call(request).await.unwrap()
    }

    /// Returns the admin's authorization header value.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Logs in and returns (access_token, refresh_token), asserting success.
    pub async fn login(&self, tenant: &str, username: &str, password: &str) -> (String, String) {
        let response = self
            .send(setup_json_request(
                "POST",
                "/auth/login",
                None,
                &json!({"tenant": tenant, "username": username, "password": password}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    /// Registers another tenant and returns its id plus a logged-in admin
    /// access token.
    pub async fn register_tenant(&self, name: &str, username: &str) -> (Uuid, String) {
        let email = format!("{}@{}.example", username, name);
        let response = self
            .send(setup_json_request(
                "POST",
                "/auth/register",
                None,
                &json!({
                    "tenant_name": name,
                    "admin_email": email,
                    "admin_username": username,
                    "admin_password": ADMIN_PASSWORD,
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let tenant_id = body["tenant_id"].as_str().unwrap().parse().unwrap();
        let (access, _) = self.login(name, username, ADMIN_PASSWORD).await;

        (tenant_id, access)
    }

    /// Creates a member user in the seeded tenant and returns their id plus
    /// a logged-in access token.
    pub async fn create_member(&self, username: &str) -> (Uuid, String) {
        let response = self
            .send(setup_json_request(
                "POST",
                "/api/v1/users",
                Some(&self.access_token),
                &json!({
                    "username": username,
                    "email": format!("{}@acme.example", username),
                    "full_name": "Member User",
                    "role": "member",
                    "password": ADMIN_PASSWORD,
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let user_id = body["id"].as_str().unwrap().parse().unwrap();
        let (access, _) = self.login("acme", username, ADMIN_PASSWORD).await;

        (user_id, access)
    }
}

/// Builds a JSON request.
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds a bodyless request.
pub fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Builds a JSON request charged to the setup address, keeping test-visible
/// rate counters untouched.
pub fn setup_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", SETUP_ADDRESS);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds a multipart upload request with a single `file` field.
pub fn multipart_request(
    uri: &str,
    token: &str,
    filename: &str,
    content_type: &str,
    content: &[u8],
) -> Request<Body> {
    let boundary = "portcullis-test-boundary";

    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Reads a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
