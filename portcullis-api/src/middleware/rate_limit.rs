//! Rate limiting middleware.
//!
//! Two limiters run on every metered request, backed by the shared
//! sliding-window counter in
//! [`RateLimiter`](portcullis_core::ratelimit::RateLimiter):
//!
//! - **IP limiter** (outer): one coarse per-address quota across the whole
//!   API, counted before authentication. Catches clients hammering many
//!   endpoints or many accounts from one address.
//! - **Identity limiter** (inner): a per-endpoint quota keyed by
//!   `(tenant, user, endpoint)` once authentication has run, or by
//!   `(client address, endpoint)` on public routes. Authenticated and
//!   anonymous traffic get separate limits from the configuration.
//!
//! A request must pass both. The endpoint component uses the matched route
//! pattern (`GET /api/v1/users/:user_id`), so every object id shares one
//! counter.
//!
//! # Headers
//!
//! Responses include rate limit headers:
//! - `X-RateLimit-Limit`: Requests allowed per window
//! - `X-RateLimit-Remaining`: Requests left in the current window
//! - `X-RateLimit-Reset`: Unix timestamp when the window expires
//! - `Retry-After`: Seconds to wait (429 responses only)
//!
//! Successful responses carry the identity limiter's headers; the outer IP
//! limiter only fills them in for requests that never reached it.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use portcullis_core::auth::principal::Principal;
use portcullis_core::ratelimit::{Quota, RateDecision, RateKey, RateSubject};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Per-address rate limiting layer for the whole API.
///
/// Runs before authentication, so it is keyed purely by client address.
/// Returns 429 with quota headers when the address is over its limit.
pub async fn ip_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = RateKey {
        tenant_id: None,
        subject: RateSubject::Address(client_ip(&request)),
        endpoint: "*".to_string(),
    };
    let quota = Quota::per_minute(state.config.rate_limit.ip_per_minute);

    let decision = state.limiter.check_and_increment(&key, quota);
    if !decision.is_allowed() {
        return Err(rate_limit_error(&decision));
    }

    let mut response = next.run(request).await;

    // The identity limiter's headers are more specific; only fill in ours
    // when the request never reached it (e.g. an early error response).
    if !response.headers().contains_key("X-RateLimit-Limit") {
        apply_quota_headers(response.headers_mut(), &decision);
    }

    Ok(response)
}

/// Per-identity rate limiting layer for a route group.
///
/// Keys by `(tenant, user, endpoint)` when authentication already ran, and
/// by `(client address, endpoint)` otherwise. Anonymous traffic uses the
/// stricter anonymous quota.
pub async fn identity_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let endpoint = endpoint_key(&request);

    let (key, quota) = match request.extensions().get::<Principal>() {
        Some(principal) => (
            RateKey {
                tenant_id: Some(principal.tenant_id),
                subject: RateSubject::User(principal.user_id),
                endpoint,
            },
            Quota::per_minute(state.config.rate_limit.per_minute),
        ),
        None => (
            RateKey {
                tenant_id: None,
                subject: RateSubject::Address(client_ip(&request)),
                endpoint,
            },
            Quota::per_minute(state.config.rate_limit.anonymous_per_minute),
        ),
    };

    let decision = state.limiter.check_and_increment(&key, quota);
    if !decision.is_allowed() {
        return Err(rate_limit_error(&decision));
    }

    let mut response = next.run(request).await;
    apply_quota_headers(response.headers_mut(), &decision);

    Ok(response)
}

/// Resolves the client address for rate limiting.
///
/// Prefers the first entry of `X-Forwarded-For` (the API is expected to sit
/// behind a proxy that overwrites the header), then the peer address from
/// the connection. Falls back to 0.0.0.0, which lumps unattributable
/// clients into one bucket rather than waving them through.
fn client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return ip;
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Builds the endpoint component of a rate key.
///
/// Uses the matched route pattern so `/api/v1/files/:file_id` is one
/// counter regardless of the id, falling back to the raw path for
/// unmatched requests.
fn endpoint_key(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    format!("{} {}", request.method(), path)
}

fn rate_limit_error(decision: &RateDecision) -> ApiError {
    ApiError::RateLimitExceeded {
        limit: decision.limit(),
        retry_after: decision.retry_after(Utc::now()),
        reset_at: decision.reset_at(),
    }
}

/// Adds quota headers to a response.
fn apply_quota_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from_str(&decision.limit().to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from_str(&decision.remaining().to_string()).unwrap(),
    );
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&decision.reset_at().to_string()).unwrap(),
    );
}
