//! Document fetching
//!
//! `Fetcher` is the boundary between the crawl loop and the outside world.
//! `HttpFetcher` retrieves publisher pages over HTTP(S), `FileFetcher` reads
//! documents saved to disk, and `RoutingFetcher` picks one by source shape.

use crate::errors::{FetchError, IngestionError};
use async_trait::async_trait;
use citeforge_common::config::CrawlConfig;
use citeforge_common::metrics::record_fetch;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, instrument};

/// A retrieved document, ready for scraping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Source the document came from
    pub url: String,
    pub body: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedDocument, FetchError>;
}

/// HTTP(S) fetcher with a fixed timeout and user agent
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestionError::ConfigError(format!("HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<ParsedDocument, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| request_error(url, e))?;

        let status = resp.status();
        if is_paywall(status) {
            return Err(FetchError::Paywalled {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.map_err(|e| request_error(url, e))?;

        Ok(ParsedDocument {
            url: url.to_string(),
            body,
            content_type,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<ParsedDocument, FetchError> {
        let start = Instant::now();
        let result = self.get(url).await;
        record_fetch(start.elapsed().as_secs_f64(), result.is_ok());

        if let Ok(doc) = &result {
            debug!(bytes = doc.body.len(), content_type = ?doc.content_type, "Fetched");
        }
        result
    }
}

/// Publishers answer unauthenticated requests for subscription content with
/// one of these
fn is_paywall(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN
    )
}

fn request_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Reads documents from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedDocument, FetchError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let start = Instant::now();

        let result = tokio::fs::read_to_string(path).await.map_err(|source| FetchError::Io {
            path: path.to_string(),
            source,
        });
        record_fetch(start.elapsed().as_secs_f64(), result.is_ok());

        Ok(ParsedDocument {
            url: url.to_string(),
            body: result?,
            content_type: content_type_for(Path::new(path)),
        })
    }
}

fn content_type_for(path: &Path) -> Option<String> {
    let mime = match path.extension()?.to_str()? {
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime.to_string())
}

/// HTTP(S) sources go over the network, anything else is read from disk
pub struct RoutingFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl RoutingFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, IngestionError> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            file: FileFetcher,
        })
    }
}

#[async_trait]
impl Fetcher for RoutingFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedDocument, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            self.http.fetch(url).await
        } else {
            self.file.fetch(url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_fetcher_reads_document() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"title": "Cable theory"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let doc = FileFetcher.fetch(&path).await.unwrap();
        assert_eq!(doc.url, path);
        assert!(doc.body.contains("Cable theory"));
        assert_eq!(doc.content_type.as_deref(), Some("application/json"));

        let doc = FileFetcher.fetch(&format!("file://{path}")).await.unwrap();
        assert!(doc.body.contains("Cable theory"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = FileFetcher.fetch(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn test_router_sends_paths_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("article.html");
        std::fs::write(&path, "<html></html>").unwrap();

        let fetcher = RoutingFetcher::new(&CrawlConfig::default()).unwrap();
        let doc = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(doc.content_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn test_paywall_statuses() {
        assert!(is_paywall(StatusCode::PAYMENT_REQUIRED));
        assert!(is_paywall(StatusCode::FORBIDDEN));
        assert!(!is_paywall(StatusCode::NOT_FOUND));
        assert!(!is_paywall(StatusCode::OK));
    }
}
