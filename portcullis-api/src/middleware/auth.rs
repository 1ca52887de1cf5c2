//! Request authentication middleware.
//!
//! Verifies the `Authorization` header on every request to a protected
//! route and injects the resulting [`Principal`] into request extensions,
//! where handlers and the identity rate limiter pick it up.
//!
//! All verification logic lives in
//! [`RequestAuthenticator`](portcullis_core::auth::authenticator::RequestAuthenticator);
//! this layer only adapts it to Axum.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

/// Authentication middleware layer
///
/// Rejects the request with 401 before it reaches the handler unless the
/// bearer token verifies and resolves to an active user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let principal = state.authenticator.authenticate(authorization).await?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
