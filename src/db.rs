use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::errors::AppError;

pub type DbPool = PgPool;

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn init_pool(database_url: &str) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations complete");
    Ok(pool)
}
