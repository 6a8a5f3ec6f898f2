//! Crawl loop
//!
//! Fetches, scrapes and ingests sources one at a time with a randomized pause
//! between requests. A failing source is logged and counted; the crawl always
//! moves on to the next one.

use crate::errors::IngestionError;
use crate::fetcher::Fetcher;
use crate::pipeline::{IngestOutcome, IngestionPipeline};
use crate::scraper::Scraper;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Tally of one crawl run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub inserted: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// (source, error) for every failed source
    pub failures: Vec<(String, String)>,
}

impl CrawlReport {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted { .. } => self.inserted += 1,
            IngestOutcome::Completed { .. } => self.completed += 1,
            IngestOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.completed + self.skipped + self.failed
    }
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    scraper: Arc<dyn Scraper>,
    pipeline: IngestionPipeline,
    delay: (Duration, Duration),
}

impl Crawler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        scraper: Arc<dyn Scraper>,
        pipeline: IngestionPipeline,
    ) -> Self {
        Self {
            fetcher,
            scraper,
            pipeline,
            delay: (Duration::ZERO, Duration::ZERO),
        }
    }

    /// Pause between sources, drawn uniformly from `[min, max]`
    pub fn with_delay(mut self, (min, max): (Duration, Duration)) -> Self {
        self.delay = (min, max.max(min));
        self
    }

    #[instrument(skip(self, sources), fields(run_id = %Uuid::new_v4(), sources = sources.len()))]
    pub async fn crawl(&self, sources: &[String]) -> CrawlReport {
        let mut report = CrawlReport::default();
        info!("Crawl started");

        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }

            match self.process(source).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(source = %source, kind = e.kind(), error = %e, "Source failed, continuing");
                    report.failed += 1;
                    report.failures.push((source.clone(), e.to_string()));
                }
            }
        }

        info!(
            inserted = report.inserted,
            completed = report.completed,
            skipped = report.skipped,
            failed = report.failed,
            "Crawl finished"
        );

        report
    }

    async fn process(&self, source: &str) -> Result<IngestOutcome, IngestionError> {
        let doc = self.fetcher.fetch(source).await?;
        let article = self
            .scraper
            .scrape(&doc)
            .map_err(|source_err| IngestionError::Scrape {
                url: source.to_string(),
                source: source_err,
            })?;

        self.pipeline.ingest(&article).await
    }

    async fn pause(&self) {
        let (min, max) = self.delay;
        if max.is_zero() {
            return;
        }
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64)
        };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// Expand command-line sources: directories become their `.json` files in
/// name order, everything else passes through unchanged.
pub fn expand_sources<I, S>(args: I) -> std::io::Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sources = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        let path = Path::new(arg);
        if !path.is_dir() {
            sources.push(arg.to_string());
            continue;
        }

        let mut files: Vec<String> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        files.sort();
        sources.extend(files);
    }
    Ok(sources)
}
