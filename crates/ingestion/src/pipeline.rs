//! Ingestion pipeline
//!
//! Orchestrates one article end to end: metadata insert, citation linking,
//! section insert. The article is marked scraped only after every stage has
//! succeeded, so a failed attempt leaves a stub that the next attempt picks
//! up and completes under the same id.

use crate::allocator::IdAllocator;
use crate::errors::{IngestStage, IngestionError};
use crate::linker::CitationLinker;
use crate::lookup::ArticleLookup;
use citeforge_common::errors::AppError;
use citeforge_common::metrics::{record_ingest, record_ingest_failure, record_sections};
use citeforge_common::{ArticleId, ArticleRecord, ArticleStore, ScrapedArticle, SectionText};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Result of a successful `ingest` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New article, new id
    Inserted { id: ArticleId },
    /// An existing stub was filled in and finished
    Completed { id: ArticleId },
    /// Already fully ingested; nothing was written
    Skipped { id: ArticleId },
}

impl IngestOutcome {
    pub fn id(&self) -> ArticleId {
        match self {
            IngestOutcome::Inserted { id }
            | IngestOutcome::Completed { id }
            | IngestOutcome::Skipped { id } => *id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Inserted { .. } => "inserted",
            IngestOutcome::Completed { .. } => "completed",
            IngestOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Per-article ingestion over an injected store
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn ArticleStore>,
    lookup: ArticleLookup,
    allocator: IdAllocator,
    linker: CitationLinker,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self::with_allocator(store.clone(), IdAllocator::new(store))
    }

    /// Use `budget` as the duplicate-key retry window for id allocation
    pub fn with_allocation_retry(self, budget: Duration) -> Self {
        let allocator = self.allocator.with_retry_budget(budget);
        Self::with_allocator(self.store, allocator)
    }

    fn with_allocator(store: Arc<dyn ArticleStore>, allocator: IdAllocator) -> Self {
        Self {
            lookup: ArticleLookup::new(store.clone()),
            linker: CitationLinker::new(store.clone(), allocator.clone()),
            allocator,
            store,
        }
    }

    /// Ingest one scraped article.
    ///
    /// Safe to call again after any failure; the retry resumes under the id
    /// the failed attempt allocated.
    #[instrument(skip(self, article), fields(title = %article.metadata.title, year = ?article.metadata.year))]
    pub async fn ingest(&self, article: &ScrapedArticle) -> Result<IngestOutcome, IngestionError> {
        let start = Instant::now();

        let result = self.ingest_inner(article).await;
        match &result {
            Ok(outcome) => {
                record_ingest(outcome.as_str(), start.elapsed().as_secs_f64());
                info!(article_id = outcome.id(), outcome = outcome.as_str(), "Article ingested");
            }
            Err(e) => {
                record_ingest_failure(e.kind());
                warn!(error = %e, stage = e.kind(), "Article ingest failed");
            }
        }

        result
    }

    async fn ingest_inner(&self, article: &ScrapedArticle) -> Result<IngestOutcome, IngestionError> {
        let meta = &article.metadata;
        article.validate().map_err(|e| {
            IngestionError::at(IngestStage::Metadata)(AppError::Validation {
                message: e.to_string(),
            })
        })?;

        // Stage 1: metadata
        let existing = self
            .lookup
            .find(&meta.title, meta.year)
            .await
            .map_err(IngestionError::at(IngestStage::Metadata))?;

        let (record, completed) = match existing {
            Some(record) if record.scraped => {
                debug!(article_id = record.id, "Already ingested, skipping");
                return Ok(IngestOutcome::Skipped { id: record.id });
            }
            Some(record) => (self.complete_stub(record, article).await?, true),
            None => {
                let id = self
                    .allocator
                    .allocate_and_insert(meta)
                    .await
                    .map_err(IngestionError::at(IngestStage::Metadata))?;
                (ArticleRecord::from_metadata(id, meta.clone()), false)
            }
        };
        let id = record.id;

        // Stage 2: citations
        self.linker.link(&record, &article.references).await?;

        // Stage 3: sections
        let sections: Vec<SectionText> = article.non_empty_sections().cloned().collect();
        let inserted = self
            .store
            .insert_sections(id, &sections)
            .await
            .map_err(IngestionError::at(IngestStage::SectionInsert))?;
        record_sections(inserted);
        debug!(article_id = id, inserted, skipped_empty = article.sections.len() - sections.len(), "Sections stored");

        self.store
            .mark_scraped(id)
            .await
            .map_err(IngestionError::at(IngestStage::Metadata))?;

        Ok(if completed {
            IngestOutcome::Completed { id }
        } else {
            IngestOutcome::Inserted { id }
        })
    }

    /// Fill the stub's unknown fields from the scraped metadata
    async fn complete_stub(
        &self,
        mut record: ArticleRecord,
        article: &ScrapedArticle,
    ) -> Result<ArticleRecord, IngestionError> {
        let mut meta = record.metadata();
        if meta.fill_unknown_from(&article.metadata) {
            self.store
                .update_metadata(record.id, &meta)
                .await
                .map_err(IngestionError::at(IngestStage::Metadata))?;
            debug!(article_id = record.id, "Stub metadata filled in");

            record.url = meta.url;
            record.journal = meta.journal;
            record.volume = meta.volume;
            record.issue = meta.issue;
            record.authors = meta.authors;
            record.doi = meta.doi;
        }

        info!(article_id = record.id, "Completing stub record");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_bidirectional, cable_theory, spiking_dynamics, FaultyStore, Faults};
    use citeforge_common::{ArticleMetadata, MemoryStore, RawReference};
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_ingest_then_reingest_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone());

        let outcome = pipeline.ingest(&spiking_dynamics()).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Inserted { id: 0 });

        let a = store.get(0).await.unwrap().unwrap();
        let r = store.get(1).await.unwrap().unwrap();
        assert!(a.scraped);
        assert_eq!(a.citations, BTreeSet::from([1]));
        assert_eq!(r.title, "Cable theory");
        assert_eq!(r.journal.as_deref(), Some("Biophys J"));
        assert_eq!(r.cited_by, BTreeSet::from([0]));
        assert!(!r.scraped);
        assert_eq!(store.sections(0).await.unwrap().len(), 1);

        let snapshot = store.list_articles().await.unwrap();
        let again = pipeline.ingest(&spiking_dynamics()).await.unwrap();

        assert_eq!(again, IngestOutcome::Skipped { id: 0 });
        assert_eq!(store.article_count().await.unwrap(), 2);
        assert_eq!(store.list_articles().await.unwrap(), snapshot);
        assert_eq!(store.section_row_count().await, 1);
    }

    #[tokio::test]
    async fn test_stub_is_completed_under_its_id() {
        let store = Arc::new(MemoryStore::new());
        let mut stub = ArticleRecord::from_metadata(5, ArticleMetadata::from_reference(&cable_theory()));
        stub.cited_by.insert(2);
        store.insert_record(stub).await;

        let mut article = ScrapedArticle::new(ArticleMetadata {
            journal: Some("Biophysical Journal".into()),
            issue: Some(2),
            doi: Some("10.1016/S0006-3495(75)85815-5".into()),
            url: vec!["https://journal.example/cable".into()],
            ..ArticleMetadata::new("Cable theory", Some(1975))
        });
        article.sections.push(SectionText::new("ABSTRACT", "Passive dendrites."));
        article.references.push(RawReference::new("Core conductors", Some(1959)));

        let pipeline = IngestionPipeline::new(store.clone());
        let outcome = pipeline.ingest(&article).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Completed { id: 5 });

        let x = store.get(5).await.unwrap().unwrap();
        assert!(x.scraped);
        // Known fields survive, unknown ones are filled
        assert_eq!(x.journal.as_deref(), Some("Biophys J"));
        assert_eq!(x.issue, Some(2));
        assert_eq!(x.url, vec!["https://journal.example/cable".to_string()]);
        assert_eq!(x.cited_by, BTreeSet::from([2]));
        assert_eq!(x.citations, BTreeSet::from([6]));
        assert_eq!(store.article_count().await.unwrap(), 2);

        assert_eq!(
            pipeline.ingest(&article).await.unwrap(),
            IngestOutcome::Skipped { id: 5 }
        );
    }

    #[tokio::test]
    async fn test_cited_article_ingested_later_keeps_links() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone());
        pipeline.ingest(&spiking_dynamics()).await.unwrap();

        let cable = ScrapedArticle::new(ArticleMetadata::from_reference(&cable_theory()));
        assert_eq!(
            pipeline.ingest(&cable).await.unwrap(),
            IngestOutcome::Completed { id: 1 }
        );

        let r = store.get(1).await.unwrap().unwrap();
        assert_eq!(r.cited_by, BTreeSet::from([0]));
        assert!(r.scraped);
        assert_bidirectional(store.as_ref()).await;
    }

    #[tokio::test]
    async fn test_invalid_article_is_rejected_at_metadata() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone());

        let err = pipeline
            .ingest(&ScrapedArticle::new(ArticleMetadata::new("", Some(2001))))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(IngestStage::Metadata));
        assert!(matches!(err.store_error(), Some(AppError::Validation { .. })));
        assert_eq!(store.article_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected_like_the_linker_skips_it() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(store.clone());

        let err = pipeline
            .ingest(&ScrapedArticle::new(ArticleMetadata::new("   ", Some(2001))))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(IngestStage::Metadata));
        assert!(matches!(err.store_error(), Some(AppError::Validation { .. })));
        assert_eq!(store.article_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_allocation_race_surfaces_at_metadata() {
        let faults = Faults {
            duplicate_inserts: AtomicUsize::new(usize::MAX),
            ..Default::default()
        };
        let store = Arc::new(FaultyStore::new(Arc::new(MemoryStore::new()), faults));
        let pipeline = IngestionPipeline::new(store)
            .with_allocation_retry(Duration::from_millis(20));

        let err = pipeline.ingest(&spiking_dynamics()).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::Metadata));
        assert!(matches!(err.store_error(), Some(AppError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn test_link_failure_is_reported_and_retry_completes() {
        let inner = Arc::new(MemoryStore::new());
        let faults = Faults {
            fail_cited_by_call: Some(0),
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(Arc::new(FaultyStore::new(inner.clone(), faults)));

        let err = pipeline.ingest(&spiking_dynamics()).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::CitationLinking));
        assert!(err.is_store_unavailable());
        assert!(!inner.get(0).await.unwrap().unwrap().scraped);

        let outcome = pipeline.ingest(&spiking_dynamics()).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Completed { id: 0 });
        assert_eq!(inner.article_count().await.unwrap(), 2);
        assert_bidirectional(inner.as_ref()).await;
    }

    #[tokio::test]
    async fn test_section_failure_is_reported_and_retry_completes() {
        let inner = Arc::new(MemoryStore::new());
        let faults = Faults {
            fail_sections_once: AtomicUsize::new(1),
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(Arc::new(FaultyStore::new(inner.clone(), faults)));

        let err = pipeline.ingest(&spiking_dynamics()).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::SectionInsert));
        assert_eq!(inner.section_row_count().await, 0);

        pipeline.ingest(&spiking_dynamics()).await.unwrap();
        assert_eq!(inner.section_row_count().await, 1);
        assert!(inner.get(0).await.unwrap().unwrap().scraped);
        assert_eq!(inner.article_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_sections_are_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let mut article = spiking_dynamics();
        article.sections.push(SectionText::new("INTRODUCTION", "   "));

        IngestionPipeline::new(store.clone()).ingest(&article).await.unwrap();

        let sections = store.sections(0).await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_name, "ABSTRACT");
    }
}
