//! One sync cycle: fetch → normalize → images → store → publish.

use chrono::Utc;
use shelfsync_core::{EmptyCatalogPolicy, ProductRecord, StrategyKind};
use shelfsync_scraper::{
    normalize_all, CatalogFetcher, DefaultRenderer, FetchError, ImageFetcher, NormalizeOptions,
    PageRenderer,
};
use shelfsync_store::{CatalogStore, StoreError};
use thiserror::Error;

use crate::publish::{NoopHook, PublishHook};

/// What a completed cycle did to the stored catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new non-empty snapshot replaced the previous one.
    Replaced {
        records: usize,
        strategy: StrategyKind,
    },
    /// Nothing usable was extracted; the previous catalog was kept.
    SkippedEmpty,
    /// Nothing usable was extracted; an empty catalog was written.
    WroteEmpty,
}

/// A cycle that ended without touching the stored catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("catalog store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

pub struct SyncPipeline<R = DefaultRenderer> {
    fetcher: CatalogFetcher<R>,
    normalize: NormalizeOptions,
    store: CatalogStore,
    empty_policy: EmptyCatalogPolicy,
    images: Option<(ImageFetcher, usize)>,
    publish: Box<dyn PublishHook>,
}

impl<R: PageRenderer> SyncPipeline<R> {
    #[must_use]
    pub fn new(
        fetcher: CatalogFetcher<R>,
        normalize: NormalizeOptions,
        store: CatalogStore,
        empty_policy: EmptyCatalogPolicy,
    ) -> Self {
        Self {
            fetcher,
            normalize,
            store,
            empty_policy,
            images: None,
            publish: Box::new(NoopHook),
        }
    }

    /// Downloads record images, `concurrency` at a time, before storing.
    #[must_use]
    pub fn with_images(mut self, images: ImageFetcher, concurrency: usize) -> Self {
        self.images = Some((images, concurrency.max(1)));
        self
    }

    #[must_use]
    pub fn with_publish_hook(mut self, hook: Box<dyn PublishHook>) -> Self {
        self.publish = hook;
        self
    }

    /// Runs one cycle.
    ///
    /// The stored catalog is only written after every earlier step succeeded.
    /// When extraction ends with zero usable records (all strategies
    /// exhausted, or everything filtered out) the [`EmptyCatalogPolicy`]
    /// decides between keeping the previous catalog and writing an empty one.
    /// A failing publish hook is logged and does not fail the cycle.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Fetch`] when extraction failed and the previous
    ///   catalog was kept.
    /// - [`SyncError::Store`] / [`SyncError::StoreTask`] when the new catalog
    ///   could not be written; the previous catalog is intact.
    pub async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
        let captured_at = Utc::now();

        let (items, strategy) = match self.fetcher.fetch().await {
            Ok(outcome) => (outcome.items, Some(outcome.strategy)),
            Err(err @ FetchError::AllStrategiesExhausted { .. })
                if self.empty_policy == EmptyCatalogPolicy::Overwrite =>
            {
                tracing::warn!(error = %err, "treating exhausted extraction as an empty catalog");
                (Vec::new(), None)
            }
            Err(err) => return Err(err.into()),
        };

        let mut records = normalize_all(&items, &self.normalize, captured_at);

        let Some(strategy) = strategy.filter(|_| !records.is_empty()) else {
            return self.handle_empty(items.len()).await;
        };

        if let Some((images, concurrency)) = &self.images {
            images.fetch_all(&mut records, *concurrency).await;
        }

        let count = records.len();
        self.persist(records).await?;
        self.run_publish_hook().await;

        tracing::info!(records = count, %strategy, "catalog synced");
        Ok(SyncOutcome::Replaced {
            records: count,
            strategy,
        })
    }

    async fn handle_empty(&self, raw_items: usize) -> Result<SyncOutcome, SyncError> {
        match self.empty_policy {
            EmptyCatalogPolicy::Preserve => {
                tracing::warn!(
                    raw_items,
                    store = %self.store.path().display(),
                    "sync produced no usable records; keeping previous catalog"
                );
                Ok(SyncOutcome::SkippedEmpty)
            }
            EmptyCatalogPolicy::Overwrite => {
                self.persist(Vec::new()).await?;
                self.run_publish_hook().await;
                tracing::warn!(raw_items, "sync produced no usable records; wrote empty catalog");
                Ok(SyncOutcome::WroteEmpty)
            }
        }
    }

    async fn persist(&self, records: Vec<ProductRecord>) -> Result<(), SyncError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.replace(&records)).await??;
        Ok(())
    }

    async fn run_publish_hook(&self) {
        match self.publish.publish().await {
            Ok(()) => tracing::info!(hook = self.publish.name(), "publish hook finished"),
            Err(e) => tracing::error!(
                hook = self.publish.name(),
                error = %e,
                "publish hook failed; stored catalog is kept"
            ),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
