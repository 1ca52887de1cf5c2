//! Application state and router builder.
//!
//! This module wires the core services (token service, authenticator,
//! session service, rate limiter, stores) into shared state and builds the
//! Axum router with all routes and middleware.
//!
//! # Example
//!
//! ```no_run
//! use portcullis_api::{app, config::Config};
//! use portcullis_core::store::{memory::MemoryStore, Bounded};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let store = Arc::new(Bounded::new(MemoryStore::new(), config.store_timeout()));
//! let state = app::AppState::new(store.clone(), store, config);
//! let router = app::build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use portcullis_core::auth::authenticator::RequestAuthenticator;
use portcullis_core::auth::keys::KeyRing;
use portcullis_core::auth::session::SessionService;
use portcullis_core::auth::token::TokenService;
use portcullis_core::ratelimit::RateLimiter;
use portcullis_core::store::{
    memory::MemoryStore, postgres::PostgresStore, Bounded, CredentialStore, FileStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is an Arc (or wraps Arcs) so the clone is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Credential and tenant storage
    pub store: Arc<dyn CredentialStore>,

    /// File storage
    pub files: Arc<dyn FileStore>,

    /// Token issuing and verification
    pub tokens: Arc<TokenService>,

    /// Per-request credential verification
    pub authenticator: RequestAuthenticator,

    /// Login, refresh, and logout flows
    pub sessions: SessionService,

    /// Sliding-window rate limiter
    pub limiter: Arc<RateLimiter>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state from stores and configuration.
    ///
    /// Builds the token service from the configured signing secrets and
    /// wires the authenticator and session service to share it.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        files: Arc<dyn FileStore>,
        config: Config,
    ) -> Self {
        let keys = KeyRing::new(&config.jwt.secret, config.jwt.previous_secret.as_deref());
        let tokens = Arc::new(TokenService::new(
            keys,
            config.access_ttl(),
            config.refresh_ttl(),
        ));

        Self {
            authenticator: RequestAuthenticator::new(Arc::clone(&tokens), Arc::clone(&store)),
            sessions: SessionService::new(Arc::clone(&tokens), Arc::clone(&store)),
            store,
            files,
            tokens,
            limiter: Arc::new(RateLimiter::new()),
            config: Arc::new(config),
        }
    }
}

/// Builds application state with the storage backend named by the
/// configuration.
///
/// A `DATABASE_URL` of `memory://` selects the in-memory store (useful for
/// development and tests); anything else is treated as a Postgres connection
/// string. Either backend is wrapped in [`Bounded`] so slow storage turns
/// into timeouts instead of hung requests.
pub async fn state_from_config(config: Config) -> anyhow::Result<AppState> {
    if config.database.url.starts_with("memory://") {
        let store = Arc::new(Bounded::new(MemoryStore::new(), config.store_timeout()));
        return Ok(AppState::new(store.clone(), store, config));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    let store = Arc::new(Bounded::new(
        PostgresStore::new(pool),
        config.store_timeout(),
    ));
    Ok(AppState::new(store.clone(), store, config))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// The router is organized as follows:
/// ```text
/// /
/// ├── /health                   # Health check (public, unmetered)
/// ├── /auth/                    # Authentication
/// │   ├── POST /register        # Register tenant + admin (public)
/// │   ├── POST /login           # Login (public)
/// │   ├── POST /refresh         # Refresh token pair (public)
/// │   └── POST /logout          # Revoke refresh token (authenticated)
/// └── /api/v1/                  # Resource API (authenticated)
///     ├── /users/
///     │   ├── GET    /          # List users (paginated)
///     │   ├── POST   /          # Create user
///     │   ├── POST   /bulk      # Create up to 50 users concurrently
///     │   ├── GET    /:user_id
///     │   ├── PUT    /:user_id
///     │   └── DELETE /:user_id  # Soft delete
///     ├── /files/
///     │   ├── POST   /upload
///     │   ├── GET    /          # List files (paginated)
///     │   ├── GET    /:file_id  # Download
///     │   └── DELETE /:file_id
///     └── /admin/               # Admin role required
///         ├── GET /tenant
///         └── GET /stats
/// ```
///
/// # Middleware Stack
///
/// Per route group, outermost first:
/// 1. Security headers (all routes)
/// 2. CORS (all routes)
/// 3. Logging (tower-http TraceLayer, all routes)
/// 4. IP rate limit (everything except /health)
/// 5. Authentication (protected groups)
/// 6. Identity rate limit (everything except /health; keyed by the
///    principal when authentication already ran, by client address
///    otherwise)
pub fn build_router(state: AppState) -> Router {
    use crate::middleware::{auth, rate_limit};
    use crate::routes;

    // Health check (public, no auth, no rate limit)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public auth endpoints; the identity limiter keys them by client
    // address under the anonymous quota
    let public_auth = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::identity_rate_limit,
        ));

    // Logout needs a valid access token on top of the refresh token it
    // revokes
    let session_auth = Router::new()
        .route("/logout", post(routes::auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::identity_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let auth_routes = public_auth.merge(session_auth);

    // User routes (require authentication)
    let user_routes = Router::new()
        .route(
            "/",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/bulk", post(routes::users::bulk_create_users))
        .route(
            "/:user_id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::deactivate_user),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::identity_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // File routes (require authentication; body limit sized for uploads
    // plus multipart framing overhead)
    let file_routes = Router::new()
        .route("/upload", post(routes::files::upload_file))
        .route("/", get(routes::files::list_files))
        .route(
            "/:file_id",
            get(routes::files::download_file).delete(routes::files::delete_file),
        )
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes() + 64 * 1024,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::identity_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    // Admin routes (require authentication; handlers check the role)
    let admin_routes = Router::new()
        .route("/tenant", get(routes::admin::tenant_info))
        .route("/stats", get(routes::admin::tenant_stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::identity_rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/files", file_routes)
        .nest("/admin", admin_routes);

    // Everything except /health sits behind the coarse per-address limiter
    let metered = Router::new()
        .nest("/auth", auth_routes)
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::ip_rate_limit,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .merge(metered)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.is_production()))
        .with_state(state)
}
