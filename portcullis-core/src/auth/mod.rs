//! Authentication and authorization primitives.
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and verification
//! - [`keys`]: Signing key ring with previous-key rotation support
//! - [`token`]: JWT issuance, verification, rotation, and revocation
//! - [`revocation`]: Revocation list for refresh token ids
//! - [`authenticator`]: Bearer header to caller identity
//! - [`session`]: Login, refresh, and logout flows
//! - [`principal`]: Authenticated identity and access outcomes
//!
//! # Security posture
//!
//! - **Password hashing**: Argon2id with 64 MB memory, 3 iterations
//! - **Tokens**: HS256 with a key fingerprint in the header and zero expiry
//!   leeway
//! - **Refresh tokens**: single-use, revocable by token id
//! - **Rejections**: uniform before authentication, specific after
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use portcullis_core::auth::keys::KeyRing;
//! use portcullis_core::auth::password::{hash_password, verify_password};
//! use portcullis_core::auth::token::TokenService;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("user password")?;
//! assert!(verify_password("user password", &hash)?);
//!
//! let tokens = TokenService::new(
//!     KeyRing::new("a-secret-of-at-least-32-characters!", None),
//!     Duration::minutes(30),
//!     Duration::days(7),
//! );
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod keys;
pub mod password;
pub mod principal;
pub mod revocation;
pub mod session;
pub mod token;
