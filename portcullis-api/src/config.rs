//! Configuration management for the API server.
//!
//! Configuration comes from environment variables, with a `.env` file loaded
//! first when present. Everything has a default except the database URL and
//! the signing secret.
//!
//! # Environment Variables
//!
//! - `API_ENV`: `dev` or `production` (default: dev)
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 8000)
//! - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for permissive (default: *)
//! - `DATABASE_URL`: `postgres://...` or `memory://` (required)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size for Postgres (default: 10)
//! - `JWT_SECRET`: Signing secret, at least 32 characters (required)
//! - `JWT_SECRET_PREVIOUS`: Retired secret still accepted for verification
//! - `ACCESS_TOKEN_EXPIRE_MINUTES`: Access token lifetime (default: 30)
//! - `REFRESH_TOKEN_EXPIRE_DAYS`: Refresh token lifetime (default: 7)
//! - `RATE_LIMIT_PER_MINUTE`: Per-user quota per endpoint (default: 10)
//! - `RATE_LIMIT_ANONYMOUS_PER_MINUTE`: Per-IP quota for unauthenticated
//!   endpoints (default: 5)
//! - `RATE_LIMIT_IP_PER_MINUTE`: Coarse per-IP ceiling across all endpoints
//!   (default: 120)
//! - `STORE_TIMEOUT_MS`: Deadline for each store call (default: 2000)
//! - `DEFAULT_PAGE_SIZE` / `MAX_PAGE_SIZE`: List pagination (default: 20 / 100)
//! - `MAX_FILE_SIZE_MB`: Upload size ceiling (default: 10)
//! - `ALLOWED_FILE_TYPES`: Comma-separated MIME allowlist for uploads
//!
//! # Example
//!
//! ```no_run
//! use portcullis_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::fmt;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token signing configuration
    pub jwt: JwtConfig,

    /// Rate limit quotas
    pub rate_limit: RateLimitConfig,

    /// Store call deadlines
    pub store: StoreConfig,

    /// List pagination bounds
    pub pagination: PaginationConfig,

    /// File upload constraints
    pub uploads: UploadConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Deployment environment name (`dev`, `production`, ...)
    pub environment: String,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Backend URL: `postgres://...` for Postgres, `memory://` for the
    /// in-process store
    pub url: String,

    /// Maximum number of connections in the Postgres pool
    pub max_connections: u32,
}

/// Token signing configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Active signing secret
    pub secret: String,

    /// Previous secret, still accepted for verification during rotation
    pub previous_secret: Option<String>,

    /// Access token lifetime in minutes
    pub access_token_expire_minutes: i64,

    /// Refresh token lifetime in days
    pub refresh_token_expire_days: i64,
}

// Secrets stay out of Debug output.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("previous_secret", &self.previous_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .finish()
    }
}

/// Rate limit quotas, all per minute
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Per authenticated user, per endpoint
    pub per_minute: u32,

    /// Per client IP on unauthenticated endpoints
    pub anonymous_per_minute: u32,

    /// Per client IP across every endpoint, the outer ceiling
    pub ip_per_minute: u32,
}

/// Store call deadlines
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Deadline for each store call in milliseconds
    pub timeout_ms: u64,
}

/// List pagination bounds
#[derive(Debug, Clone, Copy)]
pub struct PaginationConfig {
    /// Page size when the request does not name one
    pub default_page_size: u32,

    /// Largest page size a request may ask for
    pub max_page_size: u32,
}

/// File upload constraints
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Upload size ceiling in megabytes
    pub max_file_size_mb: u64,

    /// MIME types accepted for upload
    pub allowed_file_types: Vec<String>,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value fails to
    /// parse, or the signing secret is too short.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let environment = env::var("API_ENV").unwrap_or_else(|_| "dev".to_string());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()?;

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let previous_secret = env::var("JWT_SECRET_PREVIOUS").ok();
        if let Some(previous) = &previous_secret {
            if previous.len() < 32 {
                anyhow::bail!("JWT_SECRET_PREVIOUS must be at least 32 characters long");
            }
        }

        let access_token_expire_minutes = env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()?;
        let refresh_token_expire_days = env::var("REFRESH_TOKEN_EXPIRE_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<i64>()?;

        let per_minute = env::var("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;
        let anonymous_per_minute = env::var("RATE_LIMIT_ANONYMOUS_PER_MINUTE")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;
        let ip_per_minute = env::var("RATE_LIMIT_IP_PER_MINUTE")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u32>()?;

        let timeout_ms = env::var("STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u64>()?;

        let default_page_size = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<u32>()?;
        let max_page_size = env::var("MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u32>()?;
        if default_page_size == 0 || default_page_size > max_page_size {
            anyhow::bail!("DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE");
        }

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()?;
        let allowed_file_types: Vec<String> = env::var("ALLOWED_FILE_TYPES")
            .unwrap_or_else(|_| {
                "image/jpeg,image/png,image/gif,application/pdf,text/plain,text/csv".to_string()
            })
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                environment,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                previous_secret,
                access_token_expire_minutes,
                refresh_token_expire_days,
            },
            rate_limit: RateLimitConfig {
                per_minute,
                anonymous_per_minute,
                ip_per_minute,
            },
            store: StoreConfig { timeout_ms },
            pagination: PaginationConfig {
                default_page_size,
                max_page_size,
            },
            uploads: UploadConfig {
                max_file_size_mb,
                allowed_file_types,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when running with production hardening (HSTS, strict CORS)
    pub fn is_production(&self) -> bool {
        self.api.environment == "production"
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.access_token_expire_minutes)
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.jwt.refresh_token_expire_days)
    }

    /// Per-call store deadline
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store.timeout_ms)
    }

    /// Upload size ceiling in bytes
    pub fn max_upload_bytes(&self) -> usize {
        (self.uploads.max_file_size_mb as usize) * 1024 * 1024
    }
}
