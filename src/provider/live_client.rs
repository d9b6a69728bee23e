//! Live Stripe client implementation.
//!
//! Production [`BillingProvider`] with retry logic, per-call timeouts, secure
//! API key handling and error mapping. Requests go through `async-stripe`'s
//! HTTP client; responses are decoded into the small wire structs below and
//! normalised into [`super::types`].

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::types::{
    ActiveFilter, Coupon, CreateCustomerRequest, CreateInvoiceItemRequest, CreateInvoiceRequest,
    Customer, Invoice, InvoiceItem, Page, PageRequest, Price, Product,
};
use super::BillingProvider;

/// Retry and timeout settings for [`LiveStripeClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveStripeClientConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    /// First backoff delay, doubled per retry.
    pub base_delay_ms: u64,
    /// Cap on a single backoff delay, before jitter.
    pub max_delay_ms: u64,
    /// Applies to each attempt separately.
    pub timeout_seconds: u64,
}

impl Default for LiveStripeClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_seconds: 30,
        }
    }
}

impl LiveStripeClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Error returned when API key validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidApiKeyError {
    /// Description of why the key is invalid.
    pub reason: String,
}

impl std::fmt::Display for InvalidApiKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid Stripe API key: {}", self.reason)
    }
}

impl std::error::Error for InvalidApiKeyError {}

/// Accepted key prefixes: secret or restricted, test or live mode.
const KEY_PREFIXES: [&str; 4] = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"];

const MIN_KEY_LEN: usize = 20;

/// Check that `key` looks like a Stripe secret or restricted key.
///
/// Publishable keys (`pk_...`) are rejected: they cannot list customers.
pub fn validate_api_key(key: &str) -> std::result::Result<(), InvalidApiKeyError> {
    let reason = if !KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
        "expected an sk_test_, sk_live_, rk_test_ or rk_live_ key".to_string()
    } else if key.len() < MIN_KEY_LEN {
        format!("key is shorter than {MIN_KEY_LEN} characters")
    } else if key.chars().any(char::is_whitespace) {
        "key contains whitespace".to_string()
    } else {
        return Ok(());
    };

    Err(InvalidApiKeyError { reason })
}

/// Percent-encode an object ID for use as one request path segment.
fn path_segment<'a>(kind: &str, id: &'a str) -> ProviderResult<Cow<'a, str>> {
    if id.is_empty() {
        return Err(ProviderError::InvalidRequest {
            message: format!("Empty {} ID", kind),
        });
    }
    Ok(urlencoding::encode(id))
}

/// [`BillingProvider`] backed by the Stripe REST API.
///
/// Creates carry an idempotency key that is reused across retries, so a
/// retried create never makes a second object.
///
/// # Example
///
/// ```rust,ignore
/// use billdesk::provider::{LiveStripeClient, LiveStripeClientConfig};
///
/// let client = LiveStripeClient::new(
///     "sk_live_xxx".to_string(),
///     LiveStripeClientConfig::default(),
/// )?;
/// ```
#[derive(Clone)]
pub struct LiveStripeClient {
    client: stripe::Client,
    config: LiveStripeClientConfig,
    api_key: SecretString,
}

impl LiveStripeClient {
    /// Build a client for `api_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn new(
        api_key: impl Into<SecretString>,
        config: LiveStripeClientConfig,
    ) -> std::result::Result<Self, InvalidApiKeyError> {
        let api_key: SecretString = api_key.into();

        validate_api_key(api_key.expose_secret())?;

        let client = stripe::Client::new(api_key.expose_secret()).with_app_info(
            "billdesk".to_string(),
            Some(env!("CARGO_PKG_VERSION").to_string()),
            None,
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// [`new`](Self::new) with default retry and timeout settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn with_default_config(
        api_key: impl Into<SecretString>,
    ) -> std::result::Result<Self, InvalidApiKeyError> {
        Self::new(api_key, LiveStripeClientConfig::default())
    }

    /// True for `sk_test_` / `rk_test_` keys.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk_test_") || key.starts_with("rk_test_")
    }

    /// Per-attempt timeout.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// `<operation>_<uuid>`.
    #[inline]
    fn generate_idempotency_key(operation: &str) -> String {
        format!("{}_{}", operation, uuid::Uuid::new_v4())
    }

    /// A client clone whose retries of one create all send the same idempotency key.
    #[inline]
    fn idempotent_client(&self, operation: &str) -> stripe::Client {
        let key = Self::generate_idempotency_key(operation);
        self.client
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(key))
    }

    /// GET a list endpoint and normalise the page.
    async fn list<W, T>(
        &self,
        operation: &str,
        path: &str,
        params: ListParams<'_>,
        convert: fn(W) -> T,
    ) -> ProviderResult<Page<T>>
    where
        W: serde::de::DeserializeOwned + Send + 'static,
    {
        let page: WireList<W> = with_retry(&self.config, operation, || {
            self.client.get_query(path, &params)
        })
        .await?;

        Ok(Page {
            data: page.data.into_iter().map(convert).collect(),
            has_more: page.has_more,
        })
    }
}

impl std::fmt::Debug for LiveStripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStripeClient")
            .field("config", &self.config)
            .field("is_test_mode", &self.is_test_mode())
            .finish_non_exhaustive()
    }
}

/// Run one provider call with a per-attempt timeout, backing off and trying
/// again while the failure is transient (429, 5xx, timeout) and attempts
/// remain.
async fn with_retry<T, F, Fut>(
    config: &LiveStripeClientConfig,
    operation: &str,
    call: F,
) -> ProviderResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, stripe::StripeError>>,
{
    let per_attempt = Duration::from_secs(config.timeout_seconds);
    let mut attempt: u32 = 0;

    loop {
        let error = match tokio::time::timeout(per_attempt, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => map_stripe_error(e, operation, config),
            Err(_) => ProviderError::Timeout {
                operation: operation.to_string(),
                timeout_seconds: config.timeout_seconds,
            },
        };

        if !error.is_retryable() || attempt >= config.max_retries {
            return Err(error);
        }

        let delay = backoff_delay(attempt, config);
        tracing::warn!(
            target: "billdesk::provider::stripe",
            operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient Stripe failure, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// `base_delay_ms * 2^attempt`, capped at `max_delay_ms`, plus up to 25% jitter.
fn backoff_delay(attempt: u32, config: &LiveStripeClientConfig) -> Duration {
    let delay_ms = config
        .base_delay_ms
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(config.max_delay_ms);
    let jitter = fastrand::u64(0..=delay_ms / 4);
    Duration::from_millis(delay_ms.saturating_add(jitter))
}

fn map_stripe_error(
    error: stripe::StripeError,
    operation: &str,
    config: &LiveStripeClientConfig,
) -> ProviderError {
    let internal = |message: String| ProviderError::Internal { message };

    match error {
        stripe::StripeError::Stripe(request_error) => ProviderError::Api {
            operation: operation.to_string(),
            message: request_error
                .message
                .unwrap_or_else(|| "no message from Stripe".to_string()),
            code: request_error.code.map(|c| format!("{c:?}")),
            http_status: Some(request_error.http_status),
        },
        stripe::StripeError::Timeout => ProviderError::Timeout {
            operation: operation.to_string(),
            timeout_seconds: config.timeout_seconds,
        },
        stripe::StripeError::QueryStringSerialize(e) => {
            internal(format!("could not encode {operation} request: {e}"))
        }
        stripe::StripeError::JSONSerialize(e) => {
            internal(format!("could not decode {operation} response: {e}"))
        }
        stripe::StripeError::UnsupportedVersion => {
            internal("Stripe rejected the API version".to_string())
        }
        stripe::StripeError::ClientError(msg) => internal(format!("transport error: {msg}")),
    }
}

/// Query parameters shared by the list endpoints.
#[derive(Debug, Clone, Default, Serialize)]
struct ListParams<'a> {
    limit: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    starting_after: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

impl<'a> ListParams<'a> {
    fn page(page: &'a PageRequest) -> Self {
        Self {
            limit: page.limit,
            starting_after: page.starting_after.as_deref(),
            ..Default::default()
        }
    }

    /// Prices of one product. The ID goes into the query string as is.
    fn prices(product_id: &'a str, filter: ActiveFilter, page: &'a PageRequest) -> Self {
        Self {
            active: filter.as_param(),
            product: Some(product_id),
            ..Self::page(page)
        }
    }
}

/// Empty query or form body.
#[derive(Debug, Clone, Copy, Default, Serialize)]
struct NoParams {}

#[derive(Debug, Deserialize)]
struct WireList<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct WireCustomer {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

impl From<WireCustomer> for Customer {
    fn from(wire: WireCustomer) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            email: wire.email,
            metadata: wire.metadata.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    active: bool,
}

impl From<WireProduct> for Product {
    fn from(wire: WireProduct) -> Self {
        Self {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
            active: wire.active,
        }
    }
}

/// A product reference: an ID, or the object itself when expanded.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireProductRef {
    Id(String),
    Object { id: String },
}

impl WireProductRef {
    fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    id: String,
    #[serde(default)]
    product: Option<WireProductRef>,
    #[serde(default)]
    unit_amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    active: bool,
}

impl From<WirePrice> for Price {
    fn from(wire: WirePrice) -> Self {
        Self {
            id: wire.id,
            product_id: wire.product.map(WireProductRef::into_id).unwrap_or_default(),
            unit_amount: wire.unit_amount,
            currency: wire.currency,
            active: wire.active,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCoupon {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    percent_off: Option<f64>,
    #[serde(default)]
    amount_off: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    valid: bool,
}

impl From<WireCoupon> for Coupon {
    fn from(wire: WireCoupon) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            percent_off: wire.percent_off,
            amount_off: wire.amount_off,
            currency: wire.currency,
            valid: wire.valid,
        }
    }
}

/// A customer reference on an invoice: an ID, or the expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireCustomerRef {
    Id(String),
    Object { id: String },
}

#[derive(Debug, Deserialize)]
struct WireInvoice {
    id: String,
    #[serde(default)]
    customer: Option<WireCustomerRef>,
    #[serde(default)]
    status: Option<String>,
}

impl From<WireInvoice> for Invoice {
    fn from(wire: WireInvoice) -> Self {
        let customer_id = match wire.customer {
            Some(WireCustomerRef::Id(id)) | Some(WireCustomerRef::Object { id }) => id,
            None => String::new(),
        };
        Self {
            id: wire.id,
            customer_id,
            status: wire.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireInvoiceItem {
    id: String,
    #[serde(default)]
    invoice: Option<String>,
}

impl From<WireInvoiceItem> for InvoiceItem {
    fn from(wire: WireInvoiceItem) -> Self {
        Self {
            id: wire.id,
            invoice_id: wire.invoice,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CustomerForm<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
struct InvoiceDiscountForm<'a> {
    coupon: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct InvoiceForm<'a> {
    customer: &'a str,
    auto_advance: bool,
    collection_method: &'static str,
    days_until_due: u32,
    description: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    discounts: Vec<InvoiceDiscountForm<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct InvoiceItemPriceDataForm<'a> {
    currency: &'a str,
    product: &'a str,
    unit_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
struct InvoiceItemForm<'a> {
    customer: &'a str,
    invoice: &'a str,
    price_data: InvoiceItemPriceDataForm<'a>,
    quantity: i64,
}

#[async_trait::async_trait]
impl BillingProvider for LiveStripeClient {
    async fn list_customers(&self, page: PageRequest) -> ProviderResult<Page<Customer>> {
        let params = ListParams::page(&page);
        self.list::<WireCustomer, Customer>("list_customers", "/customers", params, Customer::from)
            .await
    }

    async fn list_products(
        &self,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Product>> {
        let params = ListParams {
            active: filter.as_param(),
            ..ListParams::page(&page)
        };
        self.list::<WireProduct, Product>("list_products", "/products", params, Product::from)
            .await
    }

    async fn list_prices(
        &self,
        product_id: &str,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Price>> {
        let params = ListParams::prices(product_id, filter, &page);
        self.list::<WirePrice, Price>("list_prices", "/prices", params, Price::from)
            .await
    }

    async fn list_coupons(&self, page: PageRequest) -> ProviderResult<Page<Coupon>> {
        let params = ListParams::page(&page);
        self.list::<WireCoupon, Coupon>("list_coupons", "/coupons", params, Coupon::from)
            .await
    }

    async fn get_customer(&self, customer_id: &str) -> ProviderResult<Customer> {
        let path = format!("/customers/{}", path_segment("customer", customer_id)?);

        let customer: WireCustomer = with_retry(&self.config, "get_customer", || {
            self.client.get_query(&path, NoParams {})
        })
        .await?;

        Ok(customer.into())
    }

    async fn get_price(&self, price_id: &str) -> ProviderResult<Price> {
        let path = format!("/prices/{}", path_segment("price", price_id)?);

        let price: WirePrice = with_retry(&self.config, "get_price", || {
            self.client.get_query(&path, NoParams {})
        })
        .await?;

        Ok(price.into())
    }

    async fn create_customer(&self, request: CreateCustomerRequest) -> ProviderResult<Customer> {
        let client = self.idempotent_client("create_customer");
        let form = CustomerForm {
            name: &request.name,
            email: &request.email,
            metadata: &request.metadata,
        };

        let customer: WireCustomer = with_retry(&self.config, "create_customer", || {
            client.post_form("/customers", &form)
        })
        .await?;

        Ok(customer.into())
    }

    async fn create_invoice(&self, request: CreateInvoiceRequest) -> ProviderResult<Invoice> {
        let client = self.idempotent_client("create_invoice");
        let form = InvoiceForm {
            customer: &request.customer_id,
            auto_advance: request.auto_advance,
            collection_method: request.collection_method.as_str(),
            days_until_due: request.days_until_due,
            description: &request.description,
            discounts: request
                .discounts
                .iter()
                .map(|coupon| InvoiceDiscountForm { coupon })
                .collect(),
        };

        let invoice: WireInvoice = with_retry(&self.config, "create_invoice", || {
            client.post_form("/invoices", &form)
        })
        .await?;

        Ok(invoice.into())
    }

    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItemRequest,
    ) -> ProviderResult<InvoiceItem> {
        let client = self.idempotent_client("create_invoice_item");
        let form = InvoiceItemForm {
            customer: &request.customer_id,
            invoice: &request.invoice_id,
            price_data: InvoiceItemPriceDataForm {
                currency: &request.currency,
                product: &request.product_id,
                unit_amount: request.unit_amount,
            },
            quantity: request.quantity,
        };

        let item: WireInvoiceItem = with_retry(&self.config, "create_invoice_item", || {
            client.post_form("/invoiceitems", &form)
        })
        .await?;

        Ok(item.into())
    }

    async fn send_invoice(&self, invoice_id: &str) -> ProviderResult<Invoice> {
        let client = self.idempotent_client("send_invoice");
        let path = format!("/invoices/{}/send", path_segment("invoice", invoice_id)?);

        let invoice: WireInvoice = with_retry(&self.config, "send_invoice", || {
            client.post_form(&path, NoParams {})
        })
        .await?;

        Ok(invoice.into())
    }
}
