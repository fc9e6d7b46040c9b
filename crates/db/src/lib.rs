//! PostgreSQL layer for Profitlens.
//!
//! This crate provides:
//! - [`PostgresStore`], the `Store` implementation backed by SeaORM/sqlx
//! - [`SqlTransform`], the profitability transform as a SQL query
//! - Schema migrations for the base tables, the fact table and the
//!   training view
//! - [`load_training_data`], the ordered read of the training view
//! - Connection setup from [`DatabaseConfig`]

mod decode;
pub mod migration;
pub mod store;
pub mod training;
pub mod transform;

pub use store::PostgresStore;
pub use training::load_training_data;
pub use transform::SqlTransform;

use profitlens_shared::{DatabaseConfig, PipelineError, PipelineResult};
use sea_orm::{DatabaseConnection, SqlxPostgresConnector};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;

/// Builds connection options field by field, so passwords need no URL escaping.
#[must_use]
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .password(&config.password)
}

/// Establishes a pooled connection to the database.
///
/// # Errors
///
/// Returns `PipelineError::Store` if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> PipelineResult<DatabaseConnection> {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        user = %config.user,
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options(config))
        .await
        .map_err(|e| PipelineError::Store(format!("cannot connect to PostgreSQL: {e}")))?;

    Ok(SqlxPostgresConnector::from_sqlx_postgres_pool(pool))
}
