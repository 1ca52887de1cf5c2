//! Session lifecycle: login, refresh, logout.
//!
//! Login is the one place a transient store error earns a retry. It runs
//! once per session rather than once per request, so a single retry is cheap
//! and spares the user a spurious failure. Refresh and logout are
//! request-shaped and fail fast like everything else.
//!
//! All credential rejections here are uniform. Unknown tenant, unknown user,
//! wrong password, deactivated account: one [`AccessError::Unauthenticated`],
//! so the login endpoint cannot be used to enumerate tenants or usernames.

use std::future::Future;
use std::sync::Arc;

use super::password::verify_password;
use super::principal::AccessError;
use super::token::{TokenError, TokenPair, TokenService};
use crate::store::{CredentialStore, StoreError};

/// Issues and ends sessions against a credential store.
#[derive(Clone)]
pub struct SessionService {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
}

impl SessionService {
    pub fn new(tokens: Arc<TokenService>, store: Arc<dyn CredentialStore>) -> Self {
        Self { tokens, store }
    }

    /// Exchange tenant name, username-or-email, and password for a token pair.
    ///
    /// The identifier lookup only sees active users, so a deactivated account
    /// fails exactly like a wrong password.
    pub async fn login(
        &self,
        tenant_name: &str,
        identifier: &str,
        password: &str,
    ) -> Result<TokenPair, AccessError> {
        let tenant = with_retry(|| self.store.find_tenant_by_name(tenant_name))
            .await
            .map_err(store_fault)?
            .ok_or(AccessError::Unauthenticated)?;

        let user = with_retry(|| self.store.find_user_by_identifier(tenant.id, identifier))
            .await
            .map_err(store_fault)?
            .ok_or(AccessError::Unauthenticated)?;

        let ok = verify_password(password, &user.password_hash).map_err(|err| {
            tracing::warn!(error = %err, user_id = %user.id, "stored password hash is unusable");
            AccessError::Internal
        })?;
        if !ok {
            return Err(AccessError::Unauthenticated);
        }

        self.tokens.issue_tokens(&user).map_err(token_fault)
    }

    /// Spend a refresh token and return its replacement pair.
    ///
    /// The presented token dies whether or not a new pair is minted; a stolen
    /// refresh token and its legitimate holder cannot both keep refreshing.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AccessError> {
        let claims = self
            .tokens
            .verify_refresh_token(refresh_token)
            .map_err(|_| AccessError::Unauthenticated)?;

        let user = self
            .store
            .get_user(claims.tenant_id, claims.sub)
            .await
            .map_err(store_fault)?
            .filter(|u| u.is_active)
            .ok_or(AccessError::Unauthenticated)?;

        self.tokens.rotate(&claims, &user).map_err(|err| match err {
            TokenError::Create(_) => token_fault(err),
            // Lost a concurrent refresh race, or the token was revoked.
            _ => AccessError::Unauthenticated,
        })
    }

    /// Revoke the presented refresh token.
    ///
    /// Always succeeds. A token that does not verify has nothing worth
    /// revoking, and saying so would tell the caller more than logout needs
    /// to.
    pub fn logout(&self, refresh_token: &str) {
        if let Ok(claims) = self.tokens.verify_refresh_token(refresh_token) {
            self.tokens.revoke(claims.jti, claims.exp);
        }
    }
}

/// Run a store read, retrying once if the failure looks transient.
async fn with_retry<T, F, Fut>(op: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match op().await {
        Err(err) if err.is_transient() => {
            tracing::debug!(error = %err, "transient store error during login, retrying once");
            op().await
        }
        other => other,
    }
}

fn store_fault(err: StoreError) -> AccessError {
    tracing::warn!(error = %err, "credential store failed during session operation");
    AccessError::Internal
}

fn token_fault(err: TokenError) -> AccessError {
    tracing::error!(error = %err, "token issuance failed");
    AccessError::Internal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::KeyRing;
    use crate::auth::password::hash_password;
    use crate::models::{CreateTenant, CreateUser, Role, Tenant, TenantStats, UpdateUser, User};
    use crate::store::memory::MemoryStore;
    use crate::store::{Page, PageResult};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const SECRET: &str = "test-signing-secret-with-32-chars!!";
    const PASSWORD: &str = "correct horse battery staple";

    fn token_service() -> Arc<TokenService> {
        Arc::new(TokenService::new(
            KeyRing::new(SECRET, None),
            Duration::minutes(30),
            Duration::days(7),
        ))
    }

    async fn seed(store: &MemoryStore) -> (Tenant, User) {
        let tenant = store
            .create_tenant(CreateTenant {
                name: "acme".to_string(),
            })
            .await
            .unwrap();
        let user = store
            .create_user(
                tenant.id,
                CreateUser {
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    full_name: "Alice Example".to_string(),
                    password_hash: hash_password(PASSWORD).unwrap(),
                    role: Role::Member,
                },
            )
            .await
            .unwrap();
        (tenant, user)
    }

    fn sessions(store: Arc<dyn CredentialStore>) -> (SessionService, Arc<TokenService>) {
        let tokens = token_service();
        (SessionService::new(Arc::clone(&tokens), store), tokens)
    }

    #[tokio::test]
    async fn login_returns_a_working_pair() {
        let store = Arc::new(MemoryStore::new());
        let (_, user) = seed(&store).await;
        let (service, tokens) = sessions(store);

        let pair = service.login("acme", "alice", PASSWORD).await.unwrap();
        assert_eq!(pair.token_type, "bearer");

        let claims = tokens.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant_id, user.tenant_id);
    }

    #[tokio::test]
    async fn login_accepts_email_as_identifier() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let (service, _) = sessions(store);

        // Email match is case-insensitive; tenant name too.
        let pair = service.login("ACME", "Alice@Example.COM", PASSWORD).await;
        assert!(pair.is_ok());
    }

    #[tokio::test]
    async fn every_bad_login_looks_the_same() {
        let store = Arc::new(MemoryStore::new());
        let (tenant, user) = seed(&store).await;
        let (service, _) = sessions(Arc::clone(&store) as Arc<dyn CredentialStore>);

        let unknown_tenant = service.login("globex", "alice", PASSWORD).await.unwrap_err();
        let unknown_user = service.login("acme", "bob", PASSWORD).await.unwrap_err();
        let wrong_password = service.login("acme", "alice", "guess").await.unwrap_err();

        store.deactivate_user(tenant.id, user.id).await.unwrap();
        let deactivated = service.login("acme", "alice", PASSWORD).await.unwrap_err();

        assert_eq!(unknown_tenant, AccessError::Unauthenticated);
        assert_eq!(unknown_user, unknown_tenant);
        assert_eq!(wrong_password, unknown_tenant);
        assert_eq!(deactivated, unknown_tenant);
    }

    #[tokio::test]
    async fn refresh_rotates_and_spends_the_token() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let (service, _) = sessions(store);

        let first = service.login("acme", "alice", PASSWORD).await.unwrap();
        let second = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        // The spent token no longer refreshes; the replacement does.
        let replay = service.refresh(&first.refresh_token).await.unwrap_err();
        assert_eq!(replay, AccessError::Unauthenticated);
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_is_refused_after_deactivation() {
        let store = Arc::new(MemoryStore::new());
        let (tenant, user) = seed(&store).await;
        let (service, _) = sessions(Arc::clone(&store) as Arc<dyn CredentialStore>);

        let pair = service.login("acme", "alice", PASSWORD).await.unwrap();
        store.deactivate_user(tenant.id, user.id).await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err, AccessError::Unauthenticated);
    }

    #[tokio::test]
    async fn logout_kills_the_refresh_token() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let (service, _) = sessions(store);

        let pair = service.login("acme", "alice", PASSWORD).await.unwrap();
        service.logout(&pair.refresh_token);

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err, AccessError::Unauthenticated);
    }

    #[tokio::test]
    async fn logout_swallows_garbage_silently() {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;
        let (service, _) = sessions(store);

        service.logout("not-a-token");
        service.logout("");

        // The service still works afterwards.
        assert!(service.login("acme", "alice", PASSWORD).await.is_ok());
    }

    /// Fails the next `remaining` calls with a transient error, then behaves
    /// like the wrapped in-memory store.
    struct FlakyStore {
        inner: MemoryStore,
        remaining: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore, failures: usize) -> Self {
            Self {
                inner,
                remaining: AtomicUsize::new(failures),
            }
        }

        fn trip(&self) -> Result<(), StoreError> {
            let consumed = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if consumed {
                Err(StoreError::Unavailable("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CredentialStore for FlakyStore {
        async fn create_tenant(&self, data: CreateTenant) -> Result<Tenant, StoreError> {
            self.trip()?;
            self.inner.create_tenant(data).await
        }

        async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
            self.trip()?;
            self.inner.get_tenant(tenant_id).await
        }

        async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
            self.trip()?;
            self.inner.find_tenant_by_name(name).await
        }

        async fn create_user(&self, tenant_id: Uuid, data: CreateUser) -> Result<User, StoreError> {
            self.trip()?;
            self.inner.create_user(tenant_id, data).await
        }

        async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>, StoreError> {
            self.trip()?;
            self.inner.get_user(tenant_id, user_id).await
        }

        async fn find_user_by_identifier(
            &self,
            tenant_id: Uuid,
            identifier: &str,
        ) -> Result<Option<User>, StoreError> {
            self.trip()?;
            self.inner.find_user_by_identifier(tenant_id, identifier).await
        }

        async fn list_users(
            &self,
            tenant_id: Uuid,
            page: Page,
            active_only: bool,
        ) -> Result<PageResult<User>, StoreError> {
            self.trip()?;
            self.inner.list_users(tenant_id, page, active_only).await
        }

        async fn update_user(
            &self,
            tenant_id: Uuid,
            user_id: Uuid,
            changes: UpdateUser,
        ) -> Result<Option<User>, StoreError> {
            self.trip()?;
            self.inner.update_user(tenant_id, user_id, changes).await
        }

        async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
            self.trip()?;
            self.inner.deactivate_user(tenant_id, user_id).await
        }

        async fn tenant_stats(&self, tenant_id: Uuid) -> Result<TenantStats, StoreError> {
            self.trip()?;
            self.inner.tenant_stats(tenant_id).await
        }
    }

    #[tokio::test]
    async fn login_retries_one_transient_failure() {
        let inner = MemoryStore::new();
        seed(&inner).await;
        let (service, _) = sessions(Arc::new(FlakyStore::new(inner, 1)));

        // The first tenant lookup fails; the retry lands.
        assert!(service.login("acme", "alice", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn login_gives_up_after_the_second_failure() {
        let inner = MemoryStore::new();
        seed(&inner).await;
        let (service, _) = sessions(Arc::new(FlakyStore::new(inner, 2)));

        let err = service.login("acme", "alice", PASSWORD).await.unwrap_err();
        assert_eq!(err, AccessError::Internal);
    }

    #[tokio::test]
    async fn refresh_never_retries() {
        let inner = MemoryStore::new();
        seed(&inner).await;
        let flaky = Arc::new(FlakyStore::new(inner, 0));
        let (service, _) = sessions(Arc::clone(&flaky) as Arc<dyn CredentialStore>);

        let pair = service.login("acme", "alice", PASSWORD).await.unwrap();

        // One failure budget: a retry would succeed, so an Internal error
        // proves the user lookup ran exactly once.
        flaky.remaining.store(1, Ordering::SeqCst);
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert_eq!(err, AccessError::Internal);
    }
}
