/// Database layer for Solfa
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: Embedded schema migrations
///
/// The Postgres-backed stores themselves live next to their models in
/// `crate::models`.

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{close_pool, create_pool, health_check, DatabaseConfig};
