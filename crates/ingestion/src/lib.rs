//! CiteForge Ingestion
//!
//! Turns scraped articles into a persisted, bidirectional citation graph:
//! id allocation, (title, year) lookup, citation linking, and the per-article
//! pipeline, plus the crawl loop and maintenance passes that drive them.

pub mod allocator;
pub mod crawler;
pub mod errors;
pub mod fetcher;
pub mod linker;
pub mod lookup;
pub mod maintenance;
pub mod pipeline;
pub mod scraper;

#[cfg(test)]
mod test_support;

pub use allocator::IdAllocator;
pub use crawler::{expand_sources, CrawlReport, Crawler};
pub use errors::{FetchError, IngestStage, IngestionError, ScrapeError};
pub use fetcher::{FileFetcher, Fetcher, HttpFetcher, ParsedDocument, RoutingFetcher};
pub use linker::CitationLinker;
pub use lookup::ArticleLookup;
pub use maintenance::{CitationGraph, LinkDefect, Maintenance, MaintenanceReport};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use scraper::{JsonScraper, Scraper};
