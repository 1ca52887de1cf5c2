//! Health check endpoint
//!
//! A liveness probe: answers as long as the process runs and the router is
//! serving. Storage readiness is deliberately not probed here; slow or dead
//! storage surfaces as 503s on real requests via the store timeout wrapper.
//!
//! # Endpoint
//!
//! ```text
//! GET /health
//! ```
//!
//! # Response
//!
//! ```json
//! {
//!   "status": "healthy",
//!   "timestamp": "2026-01-15T09:30:00Z",
//!   "environment": "dev",
//!   "version": "0.1.0"
//! }
//! ```

use crate::app::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Server time
    pub timestamp: DateTime<Utc>,

    /// Configured environment name
    pub environment: String,

    /// Application version
    pub version: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        environment: state.config.api.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
