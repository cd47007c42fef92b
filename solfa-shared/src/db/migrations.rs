/// Database migration runner
///
/// Migrations live in `solfa-shared/migrations/` and are embedded into the
/// binary at compile time with `sqlx::migrate!`. The API server applies
/// pending migrations on startup, replacing the schema auto-migration the
/// service used to rely on.
///
/// # Example
///
/// ```no_run
/// use solfa_shared::db::pool::{create_pool, DatabaseConfig};
/// use solfa_shared::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Applies all pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails or was modified after being applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Running database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Number of migrations embedded in this build
pub fn embedded_migration_count() -> usize {
    sqlx::migrate!("./migrations").iter().count()
}
