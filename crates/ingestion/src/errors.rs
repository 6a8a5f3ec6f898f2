//! Ingestion service error types

use citeforge_common::errors::AppError;
use citeforge_common::ArticleId;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Stage of `ingest` a failure originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Metadata,
    CitationLinking,
    SectionInsert,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Metadata => "metadata",
            IngestStage::CitationLinking => "citation-linking",
            IngestStage::SectionInsert => "section-insert",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Paywalled: HTTP {status} from {url}")]
    Paywalled { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Missing field: {field}")]
    MissingField { field: String },

    #[error("Malformed markup: {message}")]
    MalformedMarkup { message: String },
}

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: IngestStage,
        #[source]
        source: AppError,
    },

    /// Some references were linked before a store fault; re-running `link`
    /// with the same inputs completes the job
    #[error("Citation linking stopped after {} of {total} references: {source}", .linked.len())]
    PartialLink {
        linked: BTreeSet<ArticleId>,
        total: usize,
        #[source]
        source: AppError,
    },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Scrape failed for {url}: {source}")]
    Scrape {
        url: String,
        #[source]
        source: ScrapeError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IngestionError {
    /// Wrap a store error with the stage it happened in
    pub fn at(stage: IngestStage) -> impl FnOnce(AppError) -> IngestionError {
        move |source| IngestionError::Stage { stage, source }
    }

    /// Stage of `ingest` this failure belongs to, if any
    pub fn stage(&self) -> Option<IngestStage> {
        match self {
            IngestionError::Stage { stage, .. } => Some(*stage),
            IngestionError::PartialLink { .. } => Some(IngestStage::CitationLinking),
            _ => None,
        }
    }

    /// The underlying store error, if this failure came from the store
    pub fn store_error(&self) -> Option<&AppError> {
        match self {
            IngestionError::Stage { source, .. } | IngestionError::PartialLink { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Whether the store connection itself was lost
    pub fn is_store_unavailable(&self) -> bool {
        self.store_error().is_some_and(AppError::is_store_unavailable)
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::Stage { stage, .. } => stage.as_str(),
            IngestionError::PartialLink { .. } => IngestStage::CitationLinking.as_str(),
            IngestionError::Fetch(_) => "fetch",
            IngestionError::Scrape { .. } => "scrape",
            IngestionError::ConfigError(_) => "config",
        }
    }
}
