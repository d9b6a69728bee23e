//! Billdesk - a cached Stripe catalogue with tiered-discount invoicing
//!
//! Billdesk keeps an in-memory copy of a Stripe account's customers, products
//! (joined with their active price) and coupons, refreshed in the background,
//! and creates invoices with discounts chosen from the order quantity and the
//! customer's metadata.
//!
//! # Features
//!
//! - **Cache**: per-field snapshots readers can take without blocking refreshes
//! - **Refresh**: all-or-nothing startup population, periodic and forced refresh
//! - **Discounts**: bulk tiers by quantity plus an independent-artist code
//! - **Invoicing**: create, fill and send an invoice in one call
//! - **HTTP**: an axum router over all of the above
//! - **Testing**: a scriptable mock provider and in-process HTTP scenarios
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use billdesk::{BillingDesk, ConfigBuilder, LiveStripeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     billdesk::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let client = LiveStripeClient::new("sk_test_...".to_string(), config.provider.clone())?;
//!
//!     let desk = Arc::new(BillingDesk::new(Arc::new(client), &config));
//!     desk.start().await?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.server.addr()?).await?;
//!     axum::serve(listener, billdesk::http::router(desk)).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod customers;
pub mod desk;
pub mod discount;
mod error;
pub mod health;
pub mod http;
pub mod invoicing;
pub mod provider;
pub mod refresh;
pub mod settings;
pub mod testing;
pub mod utils;

// Re-exports for public API
pub use cache::{
    CacheError, CacheStatus, CacheStore, CouponRecord, CustomerRecord, CustomerView, ProductRecord,
};
pub use config::{Config, ConfigBuilder, LoggingConfig, RefreshConfig, ServerConfig};
pub use customers::NewCustomer;
pub use desk::BillingDesk;
pub use discount::{BulkTier, DiscountCodes, DiscountPolicy};
pub use error::{DeskError, ErrorResponse, Result};
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use invoicing::{InvoiceRequest, InvoicingError, InvoicingWorkflow};
pub use provider::{
    BillingProvider, LiveStripeClient, LiveStripeClientConfig, ProviderError, ProviderResult,
};
pub use refresh::{
    CycleReport, FetchError, ForcedRefreshReport, RefreshEngine, RefreshError, RefreshHandle,
    Resource,
};
pub use settings::{Settings, SettingsError, SettingsStore};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "billdesk=debug")
/// - `BILLDESK_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from the logging section of a config
///
/// `RUST_LOG`, when set, takes precedence over `config.logging.level`.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
