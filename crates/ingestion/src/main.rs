//! CiteForge Ingestion Service
//!
//! Crawls the sources given on the command line into the citation store:
//! 1. Fetches and scrapes each source
//! 2. Ingests metadata, citation links, and section text
//! 3. Prunes empty sections and repairs one-sided citation links
//!
//! Sources are URLs, file paths, or directories of scraped `.json` files.

use anyhow::Context;
use citeforge_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics::{register_metrics, FETCH_BUCKETS, METRICS_PREFIX},
    DbPool, PgArticleStore, VERSION,
};
use citeforge_ingestion::{
    expand_sources, Crawler, IngestionPipeline, JsonScraper, Maintenance, RoutingFetcher,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting CiteForge Ingestion Service v{}",
        VERSION
    );

    if config.observability.metrics_port != 0 {
        init_metrics(config.observability.metrics_port)?;
    }

    let sources = expand_sources(std::env::args().skip(1)).context("Failed to read sources")?;
    if sources.is_empty() {
        anyhow::bail!("usage: ingestion <url | file | directory>...");
    }

    // Initialize database connection
    info!("Connecting to database...");
    let pool = DbPool::new(&config.database).await?;
    let store = Arc::new(PgArticleStore::new(pool));
    store.create_tables().await?;

    let pipeline = IngestionPipeline::new(store.clone())
        .with_allocation_retry(config.crawl.allocation_retry());
    let crawler = Crawler::new(
        Arc::new(RoutingFetcher::new(&config.crawl)?),
        Arc::new(JsonScraper),
        pipeline,
    )
    .with_delay(config.crawl.delay_range());

    let report = crawler.crawl(&sources).await;
    for (source, error) in &report.failures {
        warn!(source = %source, error = %error, "Not ingested");
    }

    if config.crawl.prune_after_crawl {
        let maintenance = Maintenance::new(store).run().await?;
        info!(
            pruned_sections = maintenance.pruned_sections,
            repaired_links = maintenance.repaired,
            dangling_links = maintenance.dangling,
            "Maintenance complete"
        );
    }

    info!(
        inserted = report.inserted,
        completed = report.completed,
        skipped = report.skipped,
        failed = report.failed,
        "Ingestion service finished"
    );
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_fetch_duration_seconds", METRICS_PREFIX)),
            FETCH_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    register_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}
