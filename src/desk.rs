//! The billing desk: one handle over cache, refresh and invoicing.
//!
//! ```rust,ignore
//! let desk = BillingDesk::new(provider, &config).with_settings(store);
//! desk.start().await?;
//!
//! let customers = desk.customers();
//! let invoice_id = desk.create_invoice(request).await?;
//!
//! desk.shutdown().await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::cache::{CacheStatus, CacheStore, CouponRecord, CustomerView, ProductRecord};
use crate::config::Config;
use crate::customers::{self, NewCustomer};
use crate::discount::DiscountPolicy;
use crate::error::{DeskError, Result};
use crate::invoicing::{InvoiceRequest, InvoicingWorkflow};
use crate::provider::BillingProvider;
use crate::refresh::{RefreshEngine, RefreshHandle};
use crate::settings::{Settings, SettingsStore};

pub struct BillingDesk<P> {
    provider: Arc<P>,
    cache: Arc<CacheStore>,
    engine: RefreshEngine<P>,
    invoicing: InvoicingWorkflow<P>,
    settings: Option<SettingsStore>,
    refresh_interval: Duration,
    periodic: Mutex<Option<RefreshHandle>>,
}

impl<P: BillingProvider> BillingDesk<P> {
    /// Create a desk over `provider`. Nothing is fetched until [`start`](Self::start).
    pub fn new(provider: Arc<P>, config: &Config) -> Self {
        let cache = Arc::new(CacheStore::new());
        Self {
            engine: RefreshEngine::new(provider.clone(), cache.clone()),
            invoicing: InvoicingWorkflow::new(
                provider.clone(),
                DiscountPolicy::new(config.discounts.clone()),
            ),
            provider,
            cache,
            settings: None,
            refresh_interval: config.refresh.interval(),
            periodic: Mutex::new(None),
        }
    }

    /// Attach a settings store for reading and updating the API key.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Populate the cache, then start refreshing it periodically.
    ///
    /// # Errors
    ///
    /// Fails if the initial population fails; no periodic task is started.
    pub async fn start(&self) -> Result<()> {
        self.engine.initial_refresh().await?;

        let handle = self.engine.spawn_periodic(self.refresh_interval);
        if let Some(previous) = self.periodic.lock().await.replace(handle) {
            previous.shutdown().await;
        }
        Ok(())
    }

    pub fn customers(&self) -> Vec<CustomerView> {
        self.cache.customers().iter().map(CustomerView::from).collect()
    }

    pub fn products(&self) -> Vec<ProductRecord> {
        self.cache.products().as_ref().clone()
    }

    pub fn coupons(&self) -> HashMap<String, CouponRecord> {
        self.cache.coupons().as_ref().clone()
    }

    pub fn coupon(&self, id: &str) -> Result<CouponRecord> {
        Ok(self.cache.coupon(id)?)
    }

    pub fn status(&self) -> CacheStatus {
        self.cache.status()
    }

    /// Interval between periodic refreshes.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Create a customer on the provider. The cache picks it up on the next refresh.
    pub async fn create_customer(&self, customer: NewCustomer) -> Result<CustomerView> {
        customers::create_customer(self.provider.as_ref(), customer)
            .await
            .map_err(DeskError::CustomerCreation)
    }

    /// Create and send an invoice. Returns the invoice ID.
    pub async fn create_invoice(&self, request: InvoiceRequest) -> Result<String> {
        Ok(self.invoicing.create_and_send(request).await?)
    }

    /// Refresh customers and products in the background and return immediately.
    pub fn force_refresh(&self) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let report = engine.force_refresh().await;
            tracing::info!(
                customers = report.customers.is_ok(),
                products = report.products.is_ok(),
                "Forced cache refresh finished"
            );
        });
    }

    /// The refresh engine, for callers that want to await a refresh.
    pub fn engine(&self) -> &RefreshEngine<P> {
        &self.engine
    }

    /// Current settings. Defaults when no settings store is attached.
    pub fn settings(&self) -> Result<Settings> {
        match &self.settings {
            Some(store) => Ok(store.load()?),
            None => Ok(Settings::default()),
        }
    }

    /// Store a new API key. Takes effect on the next start.
    pub fn set_api_key(&self, api_key: &str) -> Result<Settings> {
        let store = self
            .settings
            .as_ref()
            .ok_or_else(|| DeskError::internal("no settings store configured"))?;
        Ok(store.set_api_key(api_key)?)
    }

    /// Stop the periodic refresh task and wait for it to exit.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.periodic.lock().await.take() {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheError;
    use crate::config::ConfigBuilder;
    use crate::testing::{MockProvider, Operation, fixtures};

    fn desk(provider: MockProvider) -> (BillingDesk<MockProvider>, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let config = ConfigBuilder::new().build().unwrap();
        (BillingDesk::new(provider.clone(), &config), provider)
    }

    #[tokio::test]
    async fn test_start_populates_reads() {
        let (desk, _) = desk(fixtures::catalogue());
        desk.start().await.unwrap();

        let customers = desk.customers();
        assert_eq!(customers.len(), 2);
        assert!(customers.iter().any(|c| c.id == "cus_1" && c.independent));
        assert!(customers.iter().any(|c| c.id == "cus_2" && !c.independent));
        assert_eq!(desk.products().len(), 2);
        assert_eq!(desk.coupon("bulk_tier_2").unwrap().percent_off, 10.0);
        assert!(matches!(
            desk.coupon("nope"),
            Err(DeskError::Cache(CacheError::NotFound { .. }))
        ));
        assert!(desk.status().ready);

        desk.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_fails_when_initial_refresh_fails() {
        let (desk, provider) = desk(fixtures::catalogue());
        provider.fail_on(Operation::ListCustomers);

        let err = desk.start().await.unwrap_err();
        assert!(matches!(err, DeskError::Refresh(_)));
        assert!(!desk.status().ready);
        assert!(desk.customers().is_empty());
    }

    #[tokio::test]
    async fn test_new_customer_visible_after_refresh() {
        let (desk, _) = desk(fixtures::catalogue());
        desk.start().await.unwrap();

        let view = desk
            .create_customer(NewCustomer {
                name: "Linus".to_string(),
                email: "linus@example.com".to_string(),
                independent: true,
            })
            .await
            .unwrap();
        assert_eq!(desk.customers().len(), 2);

        desk.engine().force_refresh().await;
        assert!(desk.customers().iter().any(|c| c.id == view.id && c.independent));

        desk.shutdown().await;
    }

    #[tokio::test]
    async fn test_customer_creation_error() {
        let (desk, provider) = desk(MockProvider::new());
        provider.fail_on(Operation::CreateCustomer);

        let err = desk
            .create_customer(NewCustomer {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                independent: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::CustomerCreation(_)));
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (desk, _) = desk(MockProvider::new());
        let desk = desk.with_settings(SettingsStore::at(dir.path()));

        assert_eq!(desk.settings().unwrap().api_key, "");
        desk.set_api_key("sk_test_abcdefghijklmnop").unwrap();
        assert_eq!(desk.settings().unwrap().api_key, "sk_test_abcdefghijklmnop");
    }

    #[tokio::test]
    async fn test_set_api_key_rejects_malformed_key() {
        let dir = tempfile::tempdir().unwrap();
        let (desk, _) = desk(MockProvider::new());
        let desk = desk.with_settings(SettingsStore::at(dir.path()));

        let err = desk.set_api_key("not-a-stripe-key").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(desk.settings().unwrap().api_key, "");
    }

    #[tokio::test]
    async fn test_set_api_key_without_store() {
        let (desk, _) = desk(MockProvider::new());
        assert!(desk.set_api_key("sk_test_abcdefghijklmnop").is_err());
    }
}
