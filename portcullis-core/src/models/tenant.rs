//! Tenant model.
//!
//! A tenant is the unit of isolation: every user, file, and token in the
//! system belongs to exactly one tenant, and no request may read or write
//! data across that boundary. Tenant names are unique case-insensitively.
//!
//! Backing table (Postgres backend):
//!
//! ```sql
//! CREATE TABLE tenants (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX tenants_name_key ON tenants (LOWER(name));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolated customer organization.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub name: String,
}

/// Aggregate counters for a single tenant, served by the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_files: i64,
    pub total_storage_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_serializes_all_fields() {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "acme".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&tenant).unwrap();
        assert_eq!(json["name"], "acme");
        assert!(json["id"].is_string());
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn stats_roundtrip() {
        let stats = TenantStats {
            total_users: 12,
            active_users: 10,
            total_files: 3,
            total_storage_bytes: 4096,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_users"], 12);
        assert_eq!(json["total_storage_bytes"], 4096);
    }
}
