/// Domain models and their stores
///
/// Each model comes with a store trait (the seam the API and the workflow
/// depend on) and a PostgreSQL implementation. `memory` provides in-process
/// stores with the same semantics for tests and local experiments.
///
/// # Models
///
/// - `user`: Accounts, credentials and email verification state
/// - `partition`: Sheet-music records and their validation lifecycle
///
/// # Example
///
/// ```no_run
/// use solfa_shared::models::user::{CreateUser, PgUserStore, UserStore};
/// use solfa_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let users = PgUserStore::new(pool);
///
/// let user = users
///     .create(CreateUser {
///         username: "clara".to_string(),
///         email: "clara@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         email_verified: false,
///         verification_token: Some("0f1e2d3c4b5a69788796a5b4c3d2e1f0".to_string()),
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod partition;
pub mod user;

/// Error type shared by all stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated
    #[error("Conflict on {0}")]
    Conflict(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                return StoreError::Conflict(constraint);
            }
        }

        StoreError::Database(err)
    }
}
