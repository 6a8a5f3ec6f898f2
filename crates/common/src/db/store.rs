//! Article store abstraction
//!
//! The ingestion core talks to storage only through this trait. Every
//! adjacency mutation is a set union so that duplicate or reordered
//! application converges to the same state.

use crate::article::{ArticleId, ArticleMetadata, ArticleRecord, SectionText};
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Largest allocated id, or `None` when the store is empty
    async fn max_id(&self) -> Result<Option<ArticleId>>;

    /// Allocate `max(id) + 1` (or 0) and insert `meta` under that id as one
    /// atomic step. The new row has empty adjacency and `scraped == false`.
    ///
    /// Fails with `AppError::DuplicateKey` if a concurrent writer took the id.
    async fn insert_next(&self, meta: &ArticleMetadata) -> Result<ArticleId>;

    /// Exact match on title and year; `None` year only matches `None`.
    ///
    /// When races left several rows with the same key, the lowest id wins.
    async fn find_by_key(&self, title: &str, year: Option<i32>) -> Result<Option<ArticleRecord>>;

    /// Fetch by id
    async fn get(&self, id: ArticleId) -> Result<Option<ArticleRecord>>;

    /// Overwrite the scalar and list metadata columns; adjacency is untouched
    async fn update_metadata(&self, id: ArticleId, meta: &ArticleMetadata) -> Result<()>;

    /// `cited_by ∪= {citing}`
    async fn add_cited_by(&self, id: ArticleId, citing: ArticleId) -> Result<()>;

    /// `citations ∪= cited`
    async fn add_citations(&self, id: ArticleId, cited: &BTreeSet<ArticleId>) -> Result<()>;

    /// Flag the article as fully ingested
    async fn mark_scraped(&self, id: ArticleId) -> Result<()>;

    /// Insert section rows all-or-nothing, skipping empty prose and section
    /// names the article already has. Returns the number of rows inserted.
    async fn insert_sections(&self, id: ArticleId, sections: &[SectionText]) -> Result<usize>;

    /// Section rows stored for an article
    async fn sections(&self, id: ArticleId) -> Result<Vec<SectionText>>;

    /// Delete every section row whose prose is empty or whitespace
    async fn prune_empty_sections(&self) -> Result<u64>;

    /// All articles ordered by id
    async fn list_articles(&self) -> Result<Vec<ArticleRecord>>;

    /// Number of metadata rows
    async fn article_count(&self) -> Result<u64>;
}
