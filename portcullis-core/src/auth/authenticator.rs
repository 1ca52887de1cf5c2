//! Turns an `Authorization` header into a caller identity.
//!
//! Authentication is two steps: verify the bearer token cryptographically,
//! then load the user it names from the store. The second step is what makes
//! deactivation immediate; a valid token for a deactivated or deleted user
//! authenticates nothing.
//!
//! Every credential failure maps to [`AccessError::Unauthenticated`] without
//! distinction. Only a store fault surfaces differently, as
//! [`AccessError::Internal`], because that one is our fault and the caller
//! should not be told their credentials were bad.

use std::sync::Arc;

use super::principal::{AccessError, Principal};
use super::token::TokenService;
use crate::store::CredentialStore;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticates requests from their `Authorization` header value.
#[derive(Clone)]
pub struct RequestAuthenticator {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
}

impl RequestAuthenticator {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn CredentialStore>) -> Self {
        Self { tokens, store }
    }

    /// Resolve the header value (if any) to a [`Principal`].
    ///
    /// Store failures are not retried here. This runs on every request, so a
    /// struggling backend fails fast and the client retries the request as a
    /// whole.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AccessError> {
        let token = match authorization {
            Some(value) if value.starts_with(BEARER_PREFIX) => &value[BEARER_PREFIX.len()..],
            _ => return Err(AccessError::Unauthenticated),
        };

        let claims = self
            .tokens
            .verify_access_token(token)
            .map_err(|_| AccessError::Unauthenticated)?;

        let user = self
            .store
            .get_user(claims.tenant_id, claims.sub)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "credential store failed during authentication");
                AccessError::Internal
            })?;

        match user {
            Some(user) if user.is_active => Ok(Principal::from_user(&user)),
            _ => Err(AccessError::Unauthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::KeyRing;
    use crate::models::{CreateTenant, CreateUser, Role, TenantStats, UpdateUser, User};
    use crate::store::memory::MemoryStore;
    use crate::store::{Page, PageResult, StoreError};
    use async_trait::async_trait;
    use chrono::Duration;
    use uuid::Uuid;

    const SECRET: &str = "test-signing-secret-with-32-chars!!";

    fn token_service(access_ttl: Duration) -> Arc<TokenService> {
        Arc::new(TokenService::new(
            KeyRing::new(SECRET, None),
            access_ttl,
            Duration::days(7),
        ))
    }

    async fn seed_user(store: &MemoryStore) -> User {
        let tenant = store
            .create_tenant(CreateTenant {
                name: "acme".to_string(),
            })
            .await
            .unwrap();
        store
            .create_user(
                tenant.id,
                CreateUser {
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    full_name: "Alice Example".to_string(),
                    password_hash: String::new(),
                    role: Role::Member,
                },
            )
            .await
            .unwrap()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn valid_token_resolves_to_principal() {
        let store = Arc::new(MemoryStore::new());
        let tokens = token_service(Duration::minutes(30));
        let user = seed_user(&store).await;
        let auth = RequestAuthenticator::new(Arc::clone(&tokens), store);

        let pair = tokens.issue_tokens(&user).unwrap();
        let principal = auth.authenticate(Some(&bearer(&pair.access_token))).await.unwrap();

        assert_eq!(principal.user_id, user.id);
        assert_eq!(principal.tenant_id, user.tenant_id);
        assert_eq!(principal.role, Role::Member);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let auth = RequestAuthenticator::new(
            token_service(Duration::minutes(30)),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(auth.authenticate(None).await, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthenticated() {
        let auth = RequestAuthenticator::new(
            token_service(Duration::minutes(30)),
            Arc::new(MemoryStore::new()),
        );
        let err = auth.authenticate(Some("Basic YWxpY2U6aHVudGVyMg==")).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let auth = RequestAuthenticator::new(
            token_service(Duration::minutes(30)),
            Arc::new(MemoryStore::new()),
        );
        let err = auth.authenticate(Some("Bearer not-a-token")).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store).await;

        // Same key, already-past expiry.
        let stale = token_service(Duration::seconds(-5));
        let pair = stale.issue_tokens(&user).unwrap();

        let auth = RequestAuthenticator::new(token_service(Duration::minutes(30)), store);
        let err = auth.authenticate(Some(&bearer(&pair.access_token))).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn refresh_token_does_not_authenticate_requests() {
        let store = Arc::new(MemoryStore::new());
        let tokens = token_service(Duration::minutes(30));
        let user = seed_user(&store).await;
        let auth = RequestAuthenticator::new(Arc::clone(&tokens), store);

        let pair = tokens.issue_tokens(&user).unwrap();
        let err = auth.authenticate(Some(&bearer(&pair.refresh_token))).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn deactivated_user_is_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        let tokens = token_service(Duration::minutes(30));
        let user = seed_user(&store).await;
        let auth = RequestAuthenticator::new(Arc::clone(&tokens), store.clone());

        let pair = tokens.issue_tokens(&user).unwrap();
        assert!(auth.authenticate(Some(&bearer(&pair.access_token))).await.is_ok());

        store.deactivate_user(user.tenant_id, user.id).await.unwrap();

        let err = auth.authenticate(Some(&bearer(&pair.access_token))).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_unauthenticated() {
        let tokens = token_service(Duration::minutes(30));
        let auth = RequestAuthenticator::new(Arc::clone(&tokens), Arc::new(MemoryStore::new()));

        // A perfectly valid token for a user the store has never seen.
        let ghost = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            username: "ghost".to_string(),
            email: "ghost@example.com".to_string(),
            full_name: "Ghost".to_string(),
            password_hash: String::new(),
            role: Role::Admin,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let pair = tokens.issue_tokens(&ghost).unwrap();

        let err = auth.authenticate(Some(&bearer(&pair.access_token))).await;
        assert_eq!(err, Err(AccessError::Unauthenticated));
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn create_tenant(&self, _d: CreateTenant) -> Result<crate::models::Tenant, StoreError> {
            unreachable!()
        }

        async fn get_tenant(&self, _t: Uuid) -> Result<Option<crate::models::Tenant>, StoreError> {
            unreachable!()
        }

        async fn find_tenant_by_name(
            &self,
            _n: &str,
        ) -> Result<Option<crate::models::Tenant>, StoreError> {
            unreachable!()
        }

        async fn create_user(&self, _t: Uuid, _d: CreateUser) -> Result<User, StoreError> {
            unreachable!()
        }

        async fn get_user(&self, _t: Uuid, _u: Uuid) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("store offline".to_string()))
        }

        async fn find_user_by_identifier(
            &self,
            _t: Uuid,
            _i: &str,
        ) -> Result<Option<User>, StoreError> {
            unreachable!()
        }

        async fn list_users(
            &self,
            _t: Uuid,
            _p: Page,
            _a: bool,
        ) -> Result<PageResult<User>, StoreError> {
            unreachable!()
        }

        async fn update_user(
            &self,
            _t: Uuid,
            _u: Uuid,
            _c: UpdateUser,
        ) -> Result<Option<User>, StoreError> {
            unreachable!()
        }

        async fn deactivate_user(&self, _t: Uuid, _u: Uuid) -> Result<bool, StoreError> {
            unreachable!()
        }

        async fn tenant_stats(&self, _t: Uuid) -> Result<TenantStats, StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn store_fault_is_internal_not_unauthenticated() {
        let tokens = token_service(Duration::minutes(30));
        let auth = RequestAuthenticator::new(Arc::clone(&tokens), Arc::new(BrokenStore));

        let user = seed_user(&MemoryStore::new()).await;
        let pair = tokens.issue_tokens(&user).unwrap();

        let err = auth.authenticate(Some(&bearer(&pair.access_token))).await;
        assert_eq!(err, Err(AccessError::Internal));
    }
}
