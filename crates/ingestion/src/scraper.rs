//! Scraping fetched documents into articles

use crate::errors::ScrapeError;
use crate::fetcher::ParsedDocument;
use citeforge_common::ScrapedArticle;
use serde_json::Value;
use validator::Validate;

/// Turns a fetched document into metadata, sections and references
pub trait Scraper: Send + Sync {
    fn scrape(&self, doc: &ParsedDocument) -> Result<ScrapedArticle, ScrapeError>;
}

/// Scraper for documents already extracted to the article JSON shape:
///
/// ```json
/// {
///   "title": "Spiking dynamics", "year": 2001, "journal": "J Neurophysiol",
///   "url": [], "authors": [], "doi": null, "volume": null, "issue": null,
///   "sections": [{"section_name": "ABSTRACT", "prose": "..."}],
///   "references": [{"title": "Cable theory", "year": 1975}]
/// }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonScraper;

impl Scraper for JsonScraper {
    fn scrape(&self, doc: &ParsedDocument) -> Result<ScrapedArticle, ScrapeError> {
        let value: Value = serde_json::from_str(&doc.body).map_err(malformed)?;

        if !value.get("title").is_some_and(Value::is_string) {
            return Err(ScrapeError::MissingField {
                field: "title".to_string(),
            });
        }

        let mut article: ScrapedArticle = serde_json::from_value(value).map_err(malformed)?;

        article.metadata.validate().map_err(|e| ScrapeError::MissingField {
            field: e
                .field_errors()
                .into_keys()
                .next()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "metadata".to_string()),
        })?;

        // The page we scraped is itself a known URL for the article
        if !article.metadata.url.contains(&doc.url) && is_remote(&doc.url) {
            article.metadata.url.push(doc.url.clone());
        }

        Ok(article)
    }
}

fn malformed(e: serde_json::Error) -> ScrapeError {
    ScrapeError::MalformedMarkup {
        message: e.to_string(),
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
