//! Article id allocation
//!
//! Ids are `max(id) + 1`, or 0 on an empty store. The store performs the
//! read-max and the insert under one lock; this type retries the pair when a
//! concurrent writer still wins the race and the store reports a duplicate key.

use backoff::{future::retry, ExponentialBackoff};
use citeforge_common::errors::Result;
use citeforge_common::metrics::record_allocation_retry;
use citeforge_common::{ArticleId, ArticleMetadata, ArticleStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct IdAllocator {
    store: Arc<dyn ArticleStore>,
    retry_budget: Duration,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Total time spent retrying duplicate-key races before giving up
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    /// The id the next insert would receive, from the store's current state
    pub async fn allocate_id(&self) -> Result<ArticleId> {
        Ok(self.store.max_id().await?.map(|max| max + 1).unwrap_or(0))
    }

    /// Allocate an id and insert `meta` under it atomically.
    ///
    /// `DuplicateKey` is retried with exponential backoff until the budget
    /// runs out, then surfaced. Every other error is returned immediately.
    pub async fn allocate_and_insert(&self, meta: &ArticleMetadata) -> Result<ArticleId> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(500),
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        let store = &self.store;
        retry(policy, || async move {
            store.insert_next(meta).await.map_err(|e| {
                if e.is_retryable() {
                    warn!(title = %meta.title, error = %e, "Id allocation raced, retrying");
                    record_allocation_retry();
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}
