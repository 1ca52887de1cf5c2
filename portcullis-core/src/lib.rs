//! # Portcullis Core
//!
//! The enforcement core of the Portcullis API: authentication, tenant
//! isolation, and rate limiting, with no knowledge of HTTP. The API crate
//! wires these pieces to routes; everything here is testable without a
//! server.
//!
//! ## Module Organization
//!
//! - `models`: Tenant, user, and file records
//! - `auth`: Passwords, tokens, sessions, and request authentication
//! - `ratelimit`: Sliding-window request limiter
//! - `scope`: Tenant isolation checks
//! - `store`: Credential and file storage traits and backends

pub mod auth;
pub mod models;
pub mod ratelimit;
pub mod scope;
pub mod store;

/// Current version of the portcullis core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
