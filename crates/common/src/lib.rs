//! CiteForge Common Library
//!
//! Shared code for the CiteForge ingestion service including:
//! - Article, section, and reference types
//! - Database models and the article store abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics helpers

pub mod article;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use article::{ArticleId, ArticleMetadata, ArticleRecord, RawReference, ScrapedArticle, SectionText};
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{ArticleStore, DbPool, MemoryStore, PgArticleStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
