//! Store maintenance
//!
//! Post-crawl passes over the whole store: pruning section rows with empty
//! prose, and auditing the citation graph for one-sided edges left behind by
//! interrupted links or older writers.

use citeforge_common::errors::Result;
use citeforge_common::{ArticleId, ArticleRecord, ArticleStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Citation adjacency as stored, both directions
#[derive(Debug, Default)]
pub struct CitationGraph {
    /// id -> ids it cites
    outgoing: BTreeMap<ArticleId, BTreeSet<ArticleId>>,
    /// id -> ids citing it
    incoming: BTreeMap<ArticleId, BTreeSet<ArticleId>>,
}

impl CitationGraph {
    pub fn from_records(records: &[ArticleRecord]) -> Self {
        let mut graph = Self::default();
        for r in records {
            graph.outgoing.insert(r.id, r.citations.clone());
            graph.incoming.insert(r.id, r.cited_by.clone());
        }
        graph
    }

    pub async fn load(store: &dyn ArticleStore) -> Result<Self> {
        Ok(Self::from_records(&store.list_articles().await?))
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.outgoing.contains_key(&id)
    }

    pub fn references(&self, id: ArticleId) -> impl Iterator<Item = ArticleId> + '_ {
        self.outgoing.get(&id).into_iter().flatten().copied()
    }

    pub fn citations(&self, id: ArticleId) -> impl Iterator<Item = ArticleId> + '_ {
        self.incoming.get(&id).into_iter().flatten().copied()
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    /// Every place the two directions disagree, in id order
    pub fn defects(&self) -> Vec<LinkDefect> {
        let mut defects = Vec::new();

        for (&citing, cited_ids) in &self.outgoing {
            for &cited in cited_ids {
                if !self.contains(cited) {
                    defects.push(LinkDefect::Dangling { from: citing, to: cited });
                } else if !self.citations(cited).any(|id| id == citing) {
                    defects.push(LinkDefect::MissingCitedBy { citing, cited });
                }
            }
        }

        for (&cited, citing_ids) in &self.incoming {
            for &citing in citing_ids {
                if !self.contains(citing) {
                    defects.push(LinkDefect::Dangling { from: cited, to: citing });
                } else if !self.references(citing).any(|id| id == cited) {
                    defects.push(LinkDefect::MissingCitation { citing, cited });
                }
            }
        }

        defects
    }
}

/// A citation edge recorded on only one side, or pointing at nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDefect {
    /// `citing` lists `cited`, but `cited.cited_by` lacks `citing`
    MissingCitedBy { citing: ArticleId, cited: ArticleId },
    /// `cited.cited_by` lists `citing`, but `citing.citations` lacks `cited`
    MissingCitation { citing: ArticleId, cited: ArticleId },
    /// Article `from` refers to id `to`, which does not exist
    Dangling { from: ArticleId, to: ArticleId },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub pruned_sections: u64,
    pub defects_found: usize,
    pub repaired: usize,
    pub dangling: usize,
}

pub struct Maintenance {
    store: Arc<dyn ArticleStore>,
}

impl Maintenance {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn prune_empty_sections(&self) -> Result<u64> {
        let pruned = self.store.prune_empty_sections().await?;
        info!(pruned, "Pruned empty sections");
        Ok(pruned)
    }

    pub async fn audit_citation_links(&self) -> Result<Vec<LinkDefect>> {
        let graph = CitationGraph::load(self.store.as_ref()).await?;
        let defects = graph.defects();
        info!(
            articles = graph.node_count(),
            edges = graph.edge_count(),
            defects = defects.len(),
            "Citation graph audited"
        );
        Ok(defects)
    }

    /// Restore the missing side of every one-sided edge. Dangling ids are
    /// reported but left alone. Returns the number of edges repaired.
    pub async fn repair_citation_links(&self, defects: &[LinkDefect]) -> Result<usize> {
        let mut repaired = 0;
        for defect in defects {
            match *defect {
                LinkDefect::MissingCitedBy { citing, cited } => {
                    self.store.add_cited_by(cited, citing).await?;
                    repaired += 1;
                }
                LinkDefect::MissingCitation { citing, cited } => {
                    self.store
                        .add_citations(citing, &BTreeSet::from([cited]))
                        .await?;
                    repaired += 1;
                }
                LinkDefect::Dangling { from, to } => {
                    warn!(article_id = from, missing_id = to, "Citation refers to a missing article");
                }
            }
        }
        Ok(repaired)
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<MaintenanceReport> {
        let pruned_sections = self.prune_empty_sections().await?;
        let defects = self.audit_citation_links().await?;
        let repaired = self.repair_citation_links(&defects).await?;
        let dangling = defects
            .iter()
            .filter(|d| matches!(d, LinkDefect::Dangling { .. }))
            .count();

        Ok(MaintenanceReport {
            pruned_sections,
            defects_found: defects.len(),
            repaired,
            dangling,
        })
    }
}
