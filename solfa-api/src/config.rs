/// Configuration management for the API server
///
/// Configuration is read once at startup from environment variables (a
/// `.env` file is loaded first if present) and never changes afterwards.
///
/// # Environment Variables
///
/// Server:
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `MAX_UPLOAD_BYTES`: Upload body limit (default: 25 MiB)
///
/// Database:
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
///
/// Auth:
/// - `JWT_SECRET`: HMAC signing secret, at least 32 characters (required)
///
/// Search:
/// - `ES_HOST`: Elasticsearch URL (required)
/// - `ES_USER`, `ES_PASSWORD`: Basic auth (optional)
/// - `ES_PARTITION_INDEX`: Partition index (default: partitions)
/// - `ES_AUDIT_INDEX`: Audit index (default: user_actions)
/// - `ES_ACCEPT_INVALID_CERTS`: Skip TLS verification (default: false)
///
/// Object storage:
/// - `MINIO_ENDPOINT`, `MINIO_ACCESS_KEY`, `MINIO_SECRET_KEY` (required)
/// - `MINIO_BUCKET` (default: solfa), `MINIO_REGION` (default: us-east-1)
/// - `MINIO_SECURE`: https when the endpoint has no scheme (default: false)
///
/// Mail:
/// - `SMTP_HOST`: Relay host; verification links are only logged when unset
/// - `SMTP_PORT` (default: 587), `SMTP_USER`, `SMTP_PASSWORD`
/// - `MAIL_FROM` (default: no-reply@solfa.local)
/// - `VERIFY_URL_BASE` (default: http://localhost:8080/verify)
///
/// # Example
///
/// ```no_run
/// use solfa_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Default upload body limit (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Minimum accepted `JWT_SECRET` length
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins, `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,

    /// Maximum accepted upload body size in bytes
    pub max_upload_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be kept secret and at least 32 characters.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Search engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub partition_index: String,
    pub audit_index: String,
    pub accept_invalid_certs: bool,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub secure: bool,
}

/// Outgoing mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay, None to log verification links instead of sending them
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from: String,

    /// Base URL of the verification endpoint; `?token=` is appended
    pub verify_url_base: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let flag = |key: &str| -> anyhow::Result<bool> {
            match get(key) {
                None => Ok(false),
                Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Ok(true),
                    "0" | "false" | "no" | "off" => Ok(false),
                    other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
                },
            }
        };

        let port = or_default("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let cors_origins = or_default("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("MAX_UPLOAD_BYTES is invalid: {}", e))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let max_connections = or_default("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            );
        }

        let smtp_port = or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("SMTP_PORT is invalid: {}", e))?;

        Ok(Self {
            api: ApiConfig {
                host: or_default("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                production: flag("PRODUCTION")?,
                max_upload_bytes,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            search: SearchConfig {
                host: required("ES_HOST")?,
                username: get("ES_USER"),
                password: get("ES_PASSWORD"),
                partition_index: or_default("ES_PARTITION_INDEX", "partitions"),
                audit_index: or_default("ES_AUDIT_INDEX", "user_actions"),
                accept_invalid_certs: flag("ES_ACCEPT_INVALID_CERTS")?,
            },
            storage: StorageConfig {
                endpoint: required("MINIO_ENDPOINT")?,
                access_key: required("MINIO_ACCESS_KEY")?,
                secret_key: required("MINIO_SECRET_KEY")?,
                bucket: or_default("MINIO_BUCKET", "solfa"),
                region: or_default("MINIO_REGION", "us-east-1"),
                secure: flag("MINIO_SECURE")?,
            },
            mail: MailConfig {
                smtp_host: get("SMTP_HOST"),
                smtp_port,
                smtp_user: get("SMTP_USER"),
                smtp_password: get("SMTP_PASSWORD"),
                from: or_default("MAIL_FROM", "no-reply@solfa.local"),
                verify_url_base: or_default("VERIFY_URL_BASE", "http://localhost:8080/verify"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
