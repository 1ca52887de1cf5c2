//! Data models shared by the credential and file stores.

pub mod file;
pub mod tenant;
pub mod user;

pub use file::{CreateFile, FileMetadata};
pub use tenant::{CreateTenant, Tenant, TenantStats};
pub use user::{CreateUser, Role, UpdateUser, User};
