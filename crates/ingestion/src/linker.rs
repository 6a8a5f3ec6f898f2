//! Citation linker
//!
//! Resolves a reference list into citation edges: every reference is matched
//! to a stored article by (title, year) or materialized as a stub, the citing
//! id is unioned into the cited article's `cited_by`, and finally the whole
//! batch is unioned into the citing article's `citations`.
//!
//! Every write is a set union, so a run interrupted at any point can simply
//! be repeated with the same inputs.

use crate::allocator::IdAllocator;
use crate::errors::IngestionError;
use crate::lookup::ArticleLookup;
use citeforge_common::errors::{AppError, Result};
use citeforge_common::metrics::record_link;
use citeforge_common::{ArticleId, ArticleMetadata, ArticleRecord, ArticleStore, RawReference};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct CitationLinker {
    store: Arc<dyn ArticleStore>,
    lookup: ArticleLookup,
    allocator: IdAllocator,
}

impl CitationLinker {
    pub fn new(store: Arc<dyn ArticleStore>, allocator: IdAllocator) -> Self {
        Self {
            lookup: ArticleLookup::new(store.clone()),
            store,
            allocator,
        }
    }

    /// Link `citing` to every reference, in input order.
    ///
    /// Returns the ids of all cited articles. References with a blank title
    /// cannot be matched to anything and are skipped. On a store fault the
    /// error is `IngestionError::PartialLink` with the ids linked so far.
    #[instrument(skip(self, citing, references), fields(citing_id = citing.id, references = references.len()))]
    pub async fn link(
        &self,
        citing: &ArticleRecord,
        references: &[RawReference],
    ) -> std::result::Result<BTreeSet<ArticleId>, IngestionError> {
        let total = references.len();
        let mut cited = BTreeSet::new();
        let mut stubs_created = 0;

        let partial = |linked: &BTreeSet<ArticleId>, source: AppError| IngestionError::PartialLink {
            linked: linked.clone(),
            total,
            source,
        };

        for reference in references {
            if reference.title.trim().is_empty() {
                warn!(year = ?reference.year, "Skipping reference without a title");
                continue;
            }

            let (id, created) = self
                .resolve(reference)
                .await
                .map_err(|e| partial(&cited, e))?;
            if created {
                stubs_created += 1;
            }

            self.store
                .add_cited_by(id, citing.id)
                .await
                .map_err(|e| partial(&cited, e))?;
            cited.insert(id);
        }

        self.store
            .add_citations(citing.id, &cited)
            .await
            .map_err(|e| partial(&cited, e))?;

        record_link(cited.len(), stubs_created);
        info!(linked = cited.len(), stubs_created, "Citations linked");

        Ok(cited)
    }

    /// Existing id for the reference, or a freshly inserted stub's id.
    /// The flag is true when a stub was created.
    async fn resolve(&self, reference: &RawReference) -> Result<(ArticleId, bool)> {
        if let Some(existing) = self.lookup.find(&reference.title, reference.year).await? {
            debug!(article_id = existing.id, title = %reference.title, "Reference matched");
            return Ok((existing.id, false));
        }

        let stub = ArticleMetadata::from_reference(reference);
        let id = self.allocator.allocate_and_insert(&stub).await?;
        debug!(article_id = id, title = %reference.title, "Stub created for reference");

        Ok((id, true))
    }
}
