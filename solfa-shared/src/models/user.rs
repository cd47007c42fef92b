/// User model and credential store
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     verification_token VARCHAR(64),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Accounts are never hard-deleted by any exposed operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::StoreError;

const USER_COLUMNS: &str = "id, username, email, password_hash, email_verified, \
                            verification_token, created_at, updated_at";

/// User account
///
/// Passwords are stored as Argon2id hashes. Neither the hash nor the pending
/// verification token is ever serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Auto-assigned id
    pub id: i64,

    /// Display name
    pub username: String,

    /// Email address, unique across all users
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Whether the email address has been verified
    pub email_verified: bool,

    /// Pending single-use verification token, None once consumed
    #[serde(skip_serializing, default)]
    pub verification_token: Option<String>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user, as returned by the profile endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    pub email_verified: bool,
    pub verification_token: Option<String>,
}

/// Input for updating an existing user
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
}

/// Credential store
///
/// Lookups return `Ok(None)` for missing rows; errors are reserved for
/// backend failures and constraint violations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Checks that the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Inserts a user
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if the email is already taken
    async fn create(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Consumes a verification token
    ///
    /// Marks the owning account verified and clears the token in one step.
    /// Returns None if no account holds `token`.
    async fn verify_email(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Applies a partial update, returning None if the user doesn't exist
    async fn update(&self, id: i64, data: UpdateUser) -> Result<Option<User>, StoreError>;
}

/// PostgreSQL-backed credential store
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, data: CreateUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, email_verified, verification_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.email_verified)
        .bind(data.verification_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn verify_email(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email_verified = TRUE,
                verification_token = NULL,
                updated_at = NOW()
            WHERE verification_token = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update(&self, id: i64, data: UpdateUser) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
