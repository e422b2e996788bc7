//! # Database Persistence Layer
//!
//! Postgres persistence for payment attempts, callback records and the
//! service catalog via SQLx.
//!
//! The database is **optional**. With a connection string the store writes
//! through to Postgres and reloads on startup; without one the API runs
//! in-memory only (development and tests).

pub mod callbacks;
pub mod payments;
pub mod services;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Connect and run embedded migrations.
///
/// Returns `None` when no URL is configured. Returns `Err` if the URL is set
/// but the connection or a migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running in-memory only. \
             Payment state will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Wrap a column that could not be turned back into a domain value.
pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}
