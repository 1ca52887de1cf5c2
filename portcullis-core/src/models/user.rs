//! User accounts scoped to a tenant.
//!
//! Usernames and emails are unique per tenant among active accounts. The
//! same username may exist in two different tenants, and deactivating an
//! account frees its username and email for reuse within the tenant.
//! Deletion is always a soft deactivate; rows are never removed.
//!
//! Backing table (Postgres backend):
//!
//! ```sql
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     tenant_id UUID NOT NULL REFERENCES tenants(id),
//!     username TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     full_name TEXT NOT NULL,
//!     password_hash TEXT NOT NULL,
//!     role TEXT NOT NULL DEFAULT 'member',
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX users_tenant_username_key
//!     ON users (tenant_id, username) WHERE is_active;
//! CREATE UNIQUE INDEX users_tenant_email_key
//!     ON users (tenant_id, LOWER(email)) WHERE is_active;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a user account.
///
/// `Admin` unlocks the tenant administration endpoints; `Member` is the
/// default for accounts created through the user management surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

/// A user account.
///
/// The password hash never leaves the process: it is skipped during
/// serialization so API responses cannot leak it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update for a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
}
