use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::settings::DatabaseConfig;
use crate::error::AppError;

/// Creates the PostgreSQL connection pool for the identity database.
///
/// Transient startup failures are retried a few times with a growing delay so
/// the server survives a database that is still coming up.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    log::info!("Creating database connection pool");

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        log::info!("Database connection attempt {} of {}", attempt, max_retries);

        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(60))
            .connect(&config.url)
            .await
        {
            Ok(pool) => {
                log::info!("Successfully connected to database");
                return Ok(pool);
            }
            Err(e) => {
                log::warn!("Database connection attempt {} failed: {}", attempt, e);

                // Bad credentials will not fix themselves; fail fast.
                if e.to_string().contains("authentication failed") {
                    log::error!(
                        "Database authentication failed. Check the DATABASE_URL credentials."
                    );
                    return Err(AppError::from(e));
                }

                last_error = Some(e);

                if attempt < max_retries {
                    let delay = Duration::from_secs(2 * attempt as u64);
                    log::info!("Retrying in {} seconds...", delay.as_secs());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let error = last_error
        .unwrap_or_else(|| sqlx::Error::Configuration("Unknown database connection error".into()));

    log::error!("All database connection attempts failed: {}", error);
    Err(AppError::from(error))
}

/// Verifies the pool with a trivial query at startup.
pub async fn verify_connection(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query_as::<_, (i32,)>("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            log::error!("Database connection verification failed: {}", e);
            AppError::from(e)
        })?;

    log::debug!("Database connection verified");
    Ok(())
}
