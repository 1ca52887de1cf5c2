//! File metadata.
//!
//! Uploaded content is stored alongside its metadata; only the metadata is
//! ever serialized into API responses. Files are hard-deleted, unlike user
//! accounts.
//!
//! Backing table (Postgres backend):
//!
//! ```sql
//! CREATE TABLE files (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     tenant_id UUID NOT NULL REFERENCES tenants(id),
//!     filename TEXT NOT NULL,
//!     content_type TEXT NOT NULL,
//!     size_bytes BIGINT NOT NULL,
//!     uploaded_by UUID NOT NULL,
//!     uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     content BYTEA NOT NULL
//! );
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata describing one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileMetadata {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

/// Input for storing a file. `size_bytes` is derived from `content`.
#[derive(Debug, Clone)]
pub struct CreateFile {
    pub filename: String,
    pub content_type: String,
    pub uploaded_by: Uuid,
    pub content: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_without_content() {
        let meta = FileMetadata {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 2048,
            uploaded_by: Uuid::new_v4(),
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["filename"], "report.pdf");
        assert_eq!(json["size_bytes"], 2048);
        assert!(json.get("content").is_none());
    }
}
