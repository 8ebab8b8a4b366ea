//! Connection pool construction and migration runner.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::StoreConfig;
use crate::error::StoreResult;

pub async fn create_pool(config: &StoreConfig) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.connection_string())
        .await?;
    Ok(pool)
}

/// Runs the crate's embedded migrations. Safe to call on every startup;
/// sqlx tracks applied versions in its own bookkeeping table.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
