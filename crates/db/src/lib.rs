//! Database layer for aiponge.
//!
//! Entities and repositories for the relationship, invitation and guest
//! conversion tables. Schema management lives with the main service; this
//! crate only maps rows.

pub mod entities;
pub mod repositories;
pub mod test_utils;

use aiponge_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let timeout = Duration::from_secs(config.database.timeout_secs);
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(timeout)
        .acquire_timeout(timeout)
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    tracing::info!(
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
