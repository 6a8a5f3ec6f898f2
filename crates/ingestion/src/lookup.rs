//! Article lookup by natural key
//!
//! Matching is exact and case-sensitive on both title and year. "Cable
//! Theory" and "Cable theory" are different articles here; no normalization
//! is applied.

use citeforge_common::errors::Result;
use citeforge_common::{ArticleRecord, ArticleStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct ArticleLookup {
    store: Arc<dyn ArticleStore>,
}

impl ArticleLookup {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// The stored record for (title, year), if any. An unknown year matches
    /// only records whose year is also unknown.
    pub async fn find(&self, title: &str, year: Option<i32>) -> Result<Option<ArticleRecord>> {
        self.store.find_by_key(title, year).await
    }

    pub async fn exists(&self, title: &str, year: Option<i32>) -> Result<bool> {
        Ok(self.find(title, year).await?.is_some())
    }
}
