//! Database layer for CiteForge
//!
//! Provides:
//! - SeaORM entity models for the `metadata` and `body` tables
//! - The `ArticleStore` abstraction the ingestion core depends on
//! - A PostgreSQL store and an in-memory store
//! - Connection pool management and schema bootstrap

mod memory;
pub mod models;
mod repository;
mod schema;
mod store;

pub use memory::MemoryStore;
pub use repository::PgArticleStore;
pub use schema::create_tables;
pub use store::ArticleStore;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
///
/// Lookups and the inserts they guard must observe the same data, so there
/// is a single primary connection and no read replica.
pub struct DbPool {
    primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::StoreUnavailable {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    /// Wrap an existing connection
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self { primary }
    }

    /// Get the connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }
}
