//! Authenticated caller identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Role, User};

/// The identity attached to a request after authentication succeeds.
///
/// Handlers receive a `Principal` and nothing else about the token that
/// produced it; tenant and role come from the store's current view of the
/// user, so deactivations and role changes take effect immediately rather
/// than when the token expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Gate for admin-only operations. Runs after authentication, so the
    /// failure is a distinct "forbidden", never folded into the uniform
    /// unauthenticated rejection.
    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::Forbidden)
        }
    }
}

/// Outcome tags for authentication and authorization decisions.
///
/// `Unauthenticated` deliberately covers every credential failure — missing
/// header, bad signature, expiry, revocation, unknown user, deactivated
/// account — so a caller probing the API cannot distinguish them.
/// `NotFound` covers both absent resources and resources owned by another
/// tenant, for the same reason. `Internal` means a backend fault, never a
/// caller mistake, and carries no detail outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient privileges")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("authentication backend failure")]
    Internal,
}
