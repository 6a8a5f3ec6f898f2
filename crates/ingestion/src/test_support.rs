//! Fault-injecting store wrapper and fixtures for tests

use async_trait::async_trait;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::{
    ArticleId, ArticleMetadata, ArticleRecord, ArticleStore, MemoryStore, RawReference,
    ScrapedArticle, SectionText,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which calls fail, and how
#[derive(Default)]
pub struct Faults {
    /// `insert_next` returns DuplicateKey this many times before succeeding
    pub duplicate_inserts: AtomicUsize,
    /// `insert_next` returns StoreUnavailable this many times
    pub unavailable_inserts: AtomicUsize,
    /// The `add_cited_by` call with this zero-based index fails
    pub fail_cited_by_call: Option<usize>,
    /// Next `add_citations` fails with StoreUnavailable
    pub fail_citations_once: AtomicUsize,
    /// Next `insert_sections` fails with StoreUnavailable
    pub fail_sections_once: AtomicUsize,
}

/// Delegates to a `MemoryStore`, failing where `Faults` says so
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    pub faults: Faults,
    pub insert_attempts: AtomicUsize,
    cited_by_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>, faults: Faults) -> Self {
        Self {
            inner,
            faults,
            insert_attempts: AtomicUsize::new(0),
            cited_by_calls: AtomicUsize::new(0),
        }
    }
}

fn unavailable() -> AppError {
    AppError::StoreUnavailable {
        message: "connection reset by peer".into(),
    }
}

/// Decrement `counter` if positive; true when a fault should fire
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ArticleStore for FaultyStore {
    async fn max_id(&self) -> Result<Option<ArticleId>> {
        self.inner.max_id().await
    }

    async fn insert_next(&self, meta: &ArticleMetadata) -> Result<ArticleId> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if take(&self.faults.duplicate_inserts) {
            return Err(AppError::DuplicateKey {
                message: "duplicate key value violates unique constraint \"metadata_pkey\"".into(),
            });
        }
        if take(&self.faults.unavailable_inserts) {
            return Err(unavailable());
        }
        self.inner.insert_next(meta).await
    }

    async fn find_by_key(&self, title: &str, year: Option<i32>) -> Result<Option<ArticleRecord>> {
        self.inner.find_by_key(title, year).await
    }

    async fn get(&self, id: ArticleId) -> Result<Option<ArticleRecord>> {
        self.inner.get(id).await
    }

    async fn update_metadata(&self, id: ArticleId, meta: &ArticleMetadata) -> Result<()> {
        self.inner.update_metadata(id, meta).await
    }

    async fn add_cited_by(&self, id: ArticleId, citing: ArticleId) -> Result<()> {
        let call = self.cited_by_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_cited_by_call == Some(call) {
            return Err(unavailable());
        }
        self.inner.add_cited_by(id, citing).await
    }

    async fn add_citations(&self, id: ArticleId, cited: &BTreeSet<ArticleId>) -> Result<()> {
        if take(&self.faults.fail_citations_once) {
            return Err(unavailable());
        }
        self.inner.add_citations(id, cited).await
    }

    async fn mark_scraped(&self, id: ArticleId) -> Result<()> {
        self.inner.mark_scraped(id).await
    }

    async fn insert_sections(&self, id: ArticleId, sections: &[SectionText]) -> Result<usize> {
        if take(&self.faults.fail_sections_once) {
            return Err(unavailable());
        }
        self.inner.insert_sections(id, sections).await
    }

    async fn sections(&self, id: ArticleId) -> Result<Vec<SectionText>> {
        self.inner.sections(id).await
    }

    async fn prune_empty_sections(&self) -> Result<u64> {
        self.inner.prune_empty_sections().await
    }

    async fn list_articles(&self) -> Result<Vec<ArticleRecord>> {
        self.inner.list_articles().await
    }

    async fn article_count(&self) -> Result<u64> {
        self.inner.article_count().await
    }
}

/// "Spiking dynamics" (2001) citing "Cable theory" (1975)
pub fn spiking_dynamics() -> ScrapedArticle {
    let mut article = ScrapedArticle::new(ArticleMetadata {
        journal: Some("J Neurophysiol".into()),
        doi: Some("10.1152/jn.2001.spiking".into()),
        authors: vec!["Izhikevich E".into()],
        url: vec!["https://journal.example/doi/10.1152/jn.2001.spiking".into()],
        ..ArticleMetadata::new("Spiking dynamics", Some(2001))
    });
    article
        .sections
        .push(SectionText::new("ABSTRACT", "Neurons spike in many ways."));
    article.references.push(cable_theory());
    article
}

pub fn cable_theory() -> RawReference {
    RawReference {
        journal: Some("Biophys J".into()),
        volume: Some(15),
        authors: vec!["Rall W".into()],
        ..RawReference::new("Cable theory", Some(1975))
    }
}

/// Forward and backward adjacency agree for every stored article
pub async fn assert_bidirectional(store: &dyn ArticleStore) {
    let articles = store.list_articles().await.unwrap();
    for a in &articles {
        for cited in &a.citations {
            let b = store.get(*cited).await.unwrap().unwrap();
            assert!(b.cited_by.contains(&a.id), "{} cites {} without backlink", a.id, b.id);
        }
        for citing in &a.cited_by {
            let c = store.get(*citing).await.unwrap().unwrap();
            assert!(c.citations.contains(&a.id), "{} cited by {} without forward link", a.id, c.id);
        }
    }
}
