//! Billing provider client.
//!
//! [`BillingProvider`] is the seam between the desk and Stripe. The refresh
//! engine and the invoicing workflow only ever talk to this trait, so tests
//! can swap in [`MockProvider`](crate::testing::MockProvider) and production
//! uses [`LiveStripeClient`].

pub mod error;
pub mod live_client;
pub mod types;

use async_trait::async_trait;

pub use error::{ProviderError, ProviderResult};
pub use live_client::{
    InvalidApiKeyError, LiveStripeClient, LiveStripeClientConfig, validate_api_key,
};
pub use types::{
    ActiveFilter, CollectionMethod, Coupon, CreateCustomerRequest, CreateInvoiceItemRequest,
    CreateInvoiceRequest, Customer, Invoice, InvoiceItem, Page, PageRequest, Price, Product,
};

/// Operations the desk needs from the billing provider.
///
/// Every call may fail with a provider-reported error; callers decide whether
/// that is fatal. Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait BillingProvider: Send + Sync + 'static {
    /// List one page of customers.
    async fn list_customers(&self, page: PageRequest) -> ProviderResult<Page<Customer>>;

    /// List one page of products.
    async fn list_products(
        &self,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Product>>;

    /// List one page of prices belonging to a product.
    async fn list_prices(
        &self,
        product_id: &str,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Price>>;

    /// List one page of coupons.
    async fn list_coupons(&self, page: PageRequest) -> ProviderResult<Page<Coupon>>;

    /// Retrieve a single customer.
    async fn get_customer(&self, customer_id: &str) -> ProviderResult<Customer>;

    /// Retrieve a single price.
    async fn get_price(&self, price_id: &str) -> ProviderResult<Price>;

    /// Create a customer.
    async fn create_customer(&self, request: CreateCustomerRequest) -> ProviderResult<Customer>;

    /// Create an invoice header.
    async fn create_invoice(&self, request: CreateInvoiceRequest) -> ProviderResult<Invoice>;

    /// Create an invoice item on an existing invoice.
    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItemRequest,
    ) -> ProviderResult<InvoiceItem>;

    /// Finalize and email an invoice to the customer.
    async fn send_invoice(&self, invoice_id: &str) -> ProviderResult<Invoice>;
}
