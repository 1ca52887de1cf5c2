//! # Portcullis API Server Library
//!
//! HTTP surface for the Portcullis multi-tenant backend. Everything
//! security-relevant (tokens, credentials, tenant scoping, rate windows)
//! lives in `portcullis-core`; this crate adapts it to Axum.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Authentication, rate limiting, security headers
//! - `pagination`: Page resolution and list response envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pagination;
pub mod routes;
