//! Metrics and observability utilities
//!
//! Counters and histograms for the crawl and ingestion path, named with the
//! shared `citeforge` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Buckets for page fetch latency (in seconds)
pub const FETCH_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_articles_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Articles passed through ingest, labelled by outcome"
    );

    describe_counter!(
        format!("{}_stubs_created_total", METRICS_PREFIX),
        Unit::Count,
        "Stub articles created from reference lists"
    );

    describe_counter!(
        format!("{}_citations_linked_total", METRICS_PREFIX),
        Unit::Count,
        "Citation edges resolved by the linker"
    );

    describe_counter!(
        format!("{}_sections_inserted_total", METRICS_PREFIX),
        Unit::Count,
        "Section text rows inserted"
    );

    describe_counter!(
        format!("{}_ingest_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed ingest attempts, labelled by stage"
    );

    describe_counter!(
        format!("{}_id_allocation_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Id allocations retried after a duplicate key"
    );

    describe_histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Page fetch latency in seconds"
    );

    describe_histogram!(
        format!("{}_ingest_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end ingest latency per article"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record one ingest outcome
pub fn record_ingest(outcome: &str, duration_secs: f64) {
    counter!(
        format!("{}_articles_ingested_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_ingest_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record an ingest failure at a stage
pub fn record_ingest_failure(stage: &str) {
    counter!(
        format!("{}_ingest_failures_total", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Helper to record a linker run
pub fn record_link(linked: usize, stubs_created: usize) {
    counter!(format!("{}_citations_linked_total", METRICS_PREFIX)).increment(linked as u64);
    counter!(format!("{}_stubs_created_total", METRICS_PREFIX)).increment(stubs_created as u64);
}

/// Helper to record inserted sections
pub fn record_sections(inserted: usize) {
    counter!(format!("{}_sections_inserted_total", METRICS_PREFIX)).increment(inserted as u64);
}

/// Helper to record an id allocation retry
pub fn record_allocation_retry() {
    counter!(format!("{}_id_allocation_retries_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a fetch
pub fn record_fetch(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in FETCH_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper is a no-op
        record_ingest("inserted", 0.01);
        record_ingest_failure("metadata");
        record_link(3, 1);
        record_sections(2);
        record_allocation_retry();
        record_fetch(0.2, true);
    }
}
