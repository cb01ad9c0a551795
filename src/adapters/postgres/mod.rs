//! PostgreSQL adapters - Database implementations for store ports.
//!
//! - `PostgresSubscriptionStore` - subscriber records
//! - `PgSweepLock` - advisory lock keeping sweeps single-flight across processes

mod subscription_store;
mod sweep_lock;

pub use subscription_store::PostgresSubscriptionStore;
pub use sweep_lock::PgSweepLock;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Open the connection pool and apply pending migrations if configured.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(&config.url)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }
    Ok(pool)
}
