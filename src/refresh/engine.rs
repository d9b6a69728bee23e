//! Initial, periodic and forced cache refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::fetch::{
    FetchError, Resource, fetch_coupons, fetch_customers, fetch_products_with_prices,
};
use crate::cache::CacheStore;
use crate::provider::{BillingProvider, ProviderError};

/// Errors that stop the cache from being populated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshError {
    /// The startup population failed; nothing was published.
    #[error("Initial cache refresh failed: {0}")]
    Initial(#[from] FetchError),
}

/// Outcome of one periodic refresh cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Fields replaced in the cache this cycle.
    pub updated: Vec<Resource>,
    /// Fetches that failed; their fields kept the previous value.
    pub failed: Vec<FetchError>,
}

impl CycleReport {
    /// True when every fetch succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a forced refresh: entry counts written, or the fetch error.
#[derive(Debug)]
pub struct ForcedRefreshReport {
    pub customers: Result<usize, FetchError>,
    pub products: Result<usize, FetchError>,
}

/// Handle to the periodic refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Periodic refresh task ended abnormally");
        }
    }
}

/// Populates the cache from a provider and keeps it current.
pub struct RefreshEngine<P> {
    provider: Arc<P>,
    cache: Arc<CacheStore>,
}

// Manual impl: `P` itself need not be Clone.
impl<P> Clone for RefreshEngine<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<P: BillingProvider> RefreshEngine<P> {
    /// Create an engine writing into `cache`.
    pub fn new(provider: Arc<P>, cache: Arc<CacheStore>) -> Self {
        Self { provider, cache }
    }

    /// The cache this engine writes.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Fetch customers, products and coupons in order, then publish all three.
    ///
    /// If any fetch fails, nothing is written and the store stays not ready.
    pub async fn initial_refresh(&self) -> Result<(), RefreshError> {
        let customers = fetch_customers(self.provider.as_ref()).await?;
        let products = fetch_products_with_prices(self.provider.as_ref()).await?;
        let coupons = fetch_coupons(self.provider.as_ref()).await?;

        tracing::info!(
            customers = customers.len(),
            products = products.len(),
            coupons = coupons.len(),
            "Initial cache refresh complete"
        );

        self.cache.replace_customers(customers);
        self.cache.replace_products(products);
        self.cache.replace_coupons(coupons);
        self.cache.mark_ready();
        Ok(())
    }

    /// Run one periodic cycle.
    ///
    /// Every fetch is attempted; each success is written straight away.
    pub async fn refresh_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for (resource, outcome) in [
            (Resource::Customers, self.refresh_customers().await),
            (Resource::Products, self.refresh_products().await),
            (Resource::Coupons, self.refresh_coupons().await),
        ] {
            match outcome {
                Ok(_) => report.updated.push(resource),
                Err(e) => report.failed.push(e),
            }
        }

        report
    }

    /// Refresh customers and products concurrently. Coupons are left alone.
    pub async fn force_refresh(&self) -> ForcedRefreshReport {
        let customers = tokio::spawn({
            let engine = self.clone();
            async move { engine.refresh_customers().await }
        });
        let products = tokio::spawn({
            let engine = self.clone();
            async move { engine.refresh_products().await }
        });

        let (customers, products) = tokio::join!(customers, products);

        ForcedRefreshReport {
            customers: customers.unwrap_or_else(|e| Err(aborted(Resource::Customers, e))),
            products: products.unwrap_or_else(|e| Err(aborted(Resource::Products, e))),
        }
    }

    /// Spawn the periodic refresh loop.
    ///
    /// The first cycle runs one `interval` after this call. Cancellation is
    /// observed between cycles; a cycle in progress runs to completion.
    pub fn spawn_periodic(&self, interval: Duration) -> RefreshHandle {
        let token = CancellationToken::new();
        let engine = self.clone();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Periodic cache refresh started");

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let report = engine.refresh_cycle().await;
                if report.is_complete() {
                    tracing::info!(updated = ?report.updated, "Periodic cache refresh complete");
                } else {
                    tracing::warn!(
                        updated = ?report.updated,
                        failed = report.failed.len(),
                        "Periodic cache refresh partially failed"
                    );
                }
            }

            tracing::info!("Periodic cache refresh stopped");
        });

        RefreshHandle { token, task }
    }

    async fn refresh_customers(&self) -> Result<usize, FetchError> {
        let customers = fetch_customers(self.provider.as_ref())
            .await
            .inspect_err(log_failure)?;
        let count = customers.len();
        self.cache.replace_customers(customers);
        Ok(count)
    }

    async fn refresh_products(&self) -> Result<usize, FetchError> {
        let products = fetch_products_with_prices(self.provider.as_ref())
            .await
            .inspect_err(log_failure)?;
        let count = products.len();
        self.cache.replace_products(products);
        Ok(count)
    }

    async fn refresh_coupons(&self) -> Result<usize, FetchError> {
        let coupons = fetch_coupons(self.provider.as_ref())
            .await
            .inspect_err(log_failure)?;
        let count = coupons.len();
        self.cache.replace_coupons(coupons);
        Ok(count)
    }
}

fn log_failure(error: &FetchError) {
    tracing::error!(resource = %error.resource, error = %error.source, "Cache refresh fetch failed");
}

fn aborted(resource: Resource, error: tokio::task::JoinError) -> FetchError {
    tracing::error!(resource = %resource, error = %error, "Refresh task aborted");
    FetchError {
        resource,
        source: ProviderError::Internal {
            message: format!("refresh task aborted: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Coupon;
    use crate::testing::{MockProvider, Operation, fixtures};

    fn engine(provider: MockProvider) -> (RefreshEngine<MockProvider>, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let engine = RefreshEngine::new(provider.clone(), Arc::new(CacheStore::new()));
        (engine, provider)
    }

    #[tokio::test]
    async fn test_initial_refresh_publishes_everything() {
        let (engine, _) = engine(fixtures::catalogue());
        engine.initial_refresh().await.unwrap();

        let cache = engine.cache();
        assert!(cache.is_ready());
        assert_eq!(cache.customers().len(), 2);
        assert_eq!(
            cache.products().iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["prod_1", "prod_2"]
        );
        assert_eq!(cache.coupons().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_initial_refresh_publishes_nothing() {
        let (engine, provider) = engine(fixtures::catalogue());
        provider.fail_on(Operation::ListCoupons);

        let err = engine.initial_refresh().await.unwrap_err();
        let RefreshError::Initial(fetch) = err;
        assert_eq!(fetch.resource, Resource::Coupons);

        let cache = engine.cache();
        assert!(!cache.is_ready());
        assert!(cache.customers().is_empty());
        assert!(cache.products().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_writes_successful_fields() {
        let (engine, provider) = engine(fixtures::catalogue());
        provider.fail_on(Operation::ListProducts);

        let report = engine.refresh_cycle().await;
        assert_eq!(report.updated, vec![Resource::Customers, Resource::Coupons]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].resource, Resource::Products);
        assert_eq!(engine.cache().customers().len(), 2);
        assert!(engine.cache().products().is_empty());
    }

    #[tokio::test]
    async fn test_forced_refresh_isolates_failures_and_skips_coupons() {
        let (engine, provider) = engine(fixtures::catalogue());
        engine.initial_refresh().await.unwrap();

        provider.set_customers(vec![fixtures::customer("cus_9", "New", false)]);
        provider.set_coupons(vec![Coupon::default()]);
        provider.fail_on(Operation::ListProducts);

        let report = engine.force_refresh().await;
        assert_eq!(report.customers.unwrap(), 1);
        assert_eq!(report.products.unwrap_err().resource, Resource::Products);

        let cache = engine.cache();
        assert_eq!(cache.customers()[0].id, "cus_9");
        assert_eq!(cache.products().len(), 2);
        assert_eq!(cache.coupons().len(), 4);
        assert_eq!(provider.calls(Operation::ListCoupons), 1);
    }
}
