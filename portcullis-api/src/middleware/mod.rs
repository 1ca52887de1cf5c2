//! Middleware modules for the API server
//!
//! This module contains custom middleware for:
//! - Request authentication
//! - Rate limiting (per-address and per-identity)
//! - Security headers

pub mod auth;
pub mod rate_limit;
pub mod security;
