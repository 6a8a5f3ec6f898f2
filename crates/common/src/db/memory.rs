//! In-memory article store
//!
//! Same semantics as the PostgreSQL store, held behind one async mutex.
//! Used by tests and by dry runs that should not touch a database.

use super::ArticleStore;
use crate::article::{ArticleId, ArticleMetadata, ArticleRecord, SectionText};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    articles: BTreeMap<ArticleId, ArticleRecord>,
    /// (meta_id, section) in insertion order
    sections: Vec<(ArticleId, SectionText)>,
}

impl MemoryState {
    fn article_mut(&mut self, id: ArticleId) -> Result<&mut ArticleRecord> {
        self.articles
            .get_mut(&id)
            .ok_or(AppError::ArticleNotFound { id })
    }
}

/// Article store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of section rows, including any empty ones
    pub async fn section_row_count(&self) -> usize {
        self.state.lock().await.sections.len()
    }

    /// Insert a section row without the empty-prose filter, mimicking rows
    /// left behind by older writers.
    pub async fn insert_raw_section(&self, id: ArticleId, section: SectionText) {
        self.state.lock().await.sections.push((id, section));
    }

    /// Insert a fully specified record, bypassing allocation
    pub async fn insert_record(&self, record: ArticleRecord) {
        self.state.lock().await.articles.insert(record.id, record);
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn max_id(&self) -> Result<Option<ArticleId>> {
        Ok(self.state.lock().await.articles.keys().next_back().copied())
    }

    async fn insert_next(&self, meta: &ArticleMetadata) -> Result<ArticleId> {
        let mut state = self.state.lock().await;
        let id = state
            .articles
            .keys()
            .next_back()
            .map(|max| max + 1)
            .unwrap_or(0);

        state
            .articles
            .insert(id, ArticleRecord::from_metadata(id, meta.clone()));

        Ok(id)
    }

    async fn find_by_key(&self, title: &str, year: Option<i32>) -> Result<Option<ArticleRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .articles
            .values()
            .find(|a| a.has_key(title, year))
            .cloned())
    }

    async fn get(&self, id: ArticleId) -> Result<Option<ArticleRecord>> {
        Ok(self.state.lock().await.articles.get(&id).cloned())
    }

    async fn update_metadata(&self, id: ArticleId, meta: &ArticleMetadata) -> Result<()> {
        let mut state = self.state.lock().await;
        let article = state.article_mut(id)?;

        article.url = meta.url.clone();
        article.journal = meta.journal.clone();
        article.title = meta.title.clone();
        article.year = meta.year;
        article.volume = meta.volume;
        article.issue = meta.issue;
        article.authors = meta.authors.clone();
        article.doi = meta.doi.clone();

        Ok(())
    }

    async fn add_cited_by(&self, id: ArticleId, citing: ArticleId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.article_mut(id)?.cited_by.insert(citing);
        Ok(())
    }

    async fn add_citations(&self, id: ArticleId, cited: &BTreeSet<ArticleId>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.article_mut(id)?.citations.extend(cited.iter().copied());
        Ok(())
    }

    async fn mark_scraped(&self, id: ArticleId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.article_mut(id)?.scraped = true;
        Ok(())
    }

    async fn insert_sections(&self, id: ArticleId, sections: &[SectionText]) -> Result<usize> {
        let mut state = self.state.lock().await;
        if !state.articles.contains_key(&id) {
            return Err(AppError::ArticleNotFound { id });
        }

        let mut inserted = 0;
        for section in sections.iter().filter(|s| !s.is_empty()) {
            let exists = state
                .sections
                .iter()
                .any(|(meta_id, s)| *meta_id == id && s.section_name == section.section_name);

            if !exists {
                state.sections.push((id, section.clone()));
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn sections(&self, id: ArticleId) -> Result<Vec<SectionText>> {
        let state = self.state.lock().await;
        Ok(state
            .sections
            .iter()
            .filter(|(meta_id, _)| *meta_id == id)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn prune_empty_sections(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.sections.len();
        state.sections.retain(|(_, s)| !s.is_empty());
        Ok((before - state.sections.len()) as u64)
    }

    async fn list_articles(&self) -> Result<Vec<ArticleRecord>> {
        Ok(self.state.lock().await.articles.values().cloned().collect())
    }

    async fn article_count(&self) -> Result<u64> {
        Ok(self.state.lock().await.articles.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_start_at_zero_and_increase() {
        let store = MemoryStore::new();
        assert_eq!(store.max_id().await.unwrap(), None);

        let a = store.insert_next(&ArticleMetadata::new("A", Some(2001))).await.unwrap();
        let b = store.insert_next(&ArticleMetadata::new("B", None)).await.unwrap();

        assert_eq!((a, b), (0, 1));
        assert_eq!(store.max_id().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_find_by_key_treats_unknown_year_as_a_value() {
        let store = MemoryStore::new();
        store.insert_next(&ArticleMetadata::new("Cable theory", None)).await.unwrap();

        assert!(store.find_by_key("Cable theory", None).await.unwrap().is_some());
        assert!(store.find_by_key("Cable theory", Some(1975)).await.unwrap().is_none());
        assert!(store.find_by_key("cable theory", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_union_updates_are_idempotent() {
        let store = MemoryStore::new();
        let id = store.insert_next(&ArticleMetadata::new("A", None)).await.unwrap();

        store.add_cited_by(id, 4).await.unwrap();
        store.add_cited_by(id, 4).await.unwrap();
        store.add_citations(id, &BTreeSet::from([1, 2])).await.unwrap();
        store.add_citations(id, &BTreeSet::from([2, 3])).await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.cited_by, BTreeSet::from([4]));
        assert_eq!(record.citations, BTreeSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_update_missing_article_fails() {
        let store = MemoryStore::new();
        let err = store.add_cited_by(9, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { id: 9 }));
    }

    #[tokio::test]
    async fn test_sections_skip_empty_and_existing() {
        let store = MemoryStore::new();
        let id = store.insert_next(&ArticleMetadata::new("A", None)).await.unwrap();

        let sections = vec![
            SectionText::new("ABSTRACT", "Spikes."),
            SectionText::new("METHODS", ""),
        ];
        assert_eq!(store.insert_sections(id, &sections).await.unwrap(), 1);
        assert_eq!(store.insert_sections(id, &sections).await.unwrap(), 0);
        assert_eq!(store.sections(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_removes_empty_rows() {
        let store = MemoryStore::new();
        let id = store.insert_next(&ArticleMetadata::new("A", None)).await.unwrap();
        store.insert_raw_section(id, SectionText::new("INTRODUCTION", " ")).await;
        store.insert_sections(id, &[SectionText::new("ABSTRACT", "x")]).await.unwrap();

        assert_eq!(store.prune_empty_sections().await.unwrap(), 1);
        assert_eq!(store.section_row_count().await, 1);
    }
}
