//! API route handlers
//!
//! This module contains all route handlers organized by resource:
//!
//! - `health`: Health check endpoint
//! - `auth`: Authentication endpoints (register, login, refresh, logout)
//! - `users`: User management endpoints
//! - `files`: Tenant file storage endpoints
//! - `admin`: Tenant administration endpoints

pub mod admin;
pub mod auth;
pub mod files;
pub mod health;
pub mod users;

use serde::{Deserialize, Serialize};

/// Plain confirmation body for operations with nothing else to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable outcome
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
