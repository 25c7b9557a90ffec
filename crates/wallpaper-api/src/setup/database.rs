//! Database pool and migrations.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use wallpaper_core::Config;

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections())
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(config.database_url())
        .await
        .context("failed to connect to database")?;

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../wallpaper-db/migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("database migrations applied");

    Ok(pool)
}
