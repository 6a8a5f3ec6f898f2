//! Error types for CiteForge
//!
//! Provides:
//! - Distinct error types for the store's failure modes
//! - Machine-readable error codes
//! - Retry classification for the crawl loop
//!
//! A lookup miss is not an error: lookups return `Option`.

use sea_orm::{sqlx, DbErr, RuntimeErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    ArticleNotFound,

    // Conflict errors (5xxx)
    DuplicateKey,

    // Database errors (7xxx)
    DatabaseError,
    StoreUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::ArticleNotFound => 4002,

            ErrorCode::DuplicateKey => 5002,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::StoreUnavailable => 7002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // Resource errors
    /// An update targeted an id that is not in the store
    #[error("Article not found: {id}")]
    ArticleNotFound { id: i64 },

    // Conflict errors
    /// Two allocations observed the same max id; retry allocate-and-insert
    #[error("Duplicate key: {message}")]
    DuplicateKey { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(DbErr),

    /// Connection lost or pool exhausted; fatal to the current attempt
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::ArticleNotFound { .. } => ErrorCode::ArticleNotFound,
            AppError::DuplicateKey { .. } => ErrorCode::DuplicateKey,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the failed step may be retried as-is.
    ///
    /// Only id-allocation races qualify. A lost store is surfaced to the
    /// caller instead of being retried internally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::DuplicateKey { .. })
    }

    /// Whether the store itself is gone
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable { .. })
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            return AppError::DuplicateKey { message };
        }

        let lost = match &err {
            DbErr::Query(RuntimeErr::SqlxError(e)) | DbErr::Exec(RuntimeErr::SqlxError(e)) => {
                is_connection_lost(e)
            }
            _ => false,
        };
        if lost {
            return AppError::StoreUnavailable {
                message: err.to_string(),
            };
        }

        match err {
            DbErr::ConnectionAcquire(e) => AppError::StoreUnavailable {
                message: e.to_string(),
            },
            DbErr::Conn(e) => AppError::StoreUnavailable {
                message: e.to_string(),
            },
            other => AppError::Database(other),
        }
    }
}

/// The connection dropped or the pool gave up mid-statement
fn is_connection_lost(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
