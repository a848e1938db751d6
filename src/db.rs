//! Database connection pool and migration management.

use sqlx::{Pool, Postgres};

/// Type alias for the PostgreSQL connection pool shared across handlers.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// The pool maintains a small set of reusable connections; batch ingestion
/// holds one of them for the duration of its transaction.
///
/// # Errors
///
/// Returns an error if the connection string is invalid, the server is
/// unreachable, or authentication fails.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migration files follow the `<timestamp>_<name>.sql` convention and are
/// tracked in the `_sqlx_migrations` table, so each one runs exactly once.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro embeds ./migrations contents at compile time
    sqlx::migrate!("./migrations").run(pool).await
}
