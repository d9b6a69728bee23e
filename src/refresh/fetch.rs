//! Full-listing fetches from the provider.
//!
//! Each fetch pages through its resource until the provider reports no more
//! results. Any provider error aborts the fetch and drops what was collected.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use crate::cache::{CouponRecord, CustomerRecord, ProductRecord};
use crate::provider::{
    ActiveFilter, BillingProvider, Coupon, Customer, Page, PageRequest, Product, ProviderError,
    ProviderResult,
};

/// The cached resource a fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Customers,
    Products,
    Coupons,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Coupons => "coupons",
        })
    }
}

/// A fetch that failed partway; nothing it collected is kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to fetch {resource}: {source}")]
pub struct FetchError {
    pub resource: Resource,
    #[source]
    pub source: ProviderError,
}

impl FetchError {
    fn new(resource: Resource) -> impl FnOnce(ProviderError) -> Self {
        move |source| Self { resource, source }
    }
}

/// Drain a paginated listing.
async fn collect_pages<T, F, Fut>(mut list: F, id_of: fn(&T) -> &str) -> ProviderResult<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = ProviderResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut request = PageRequest::default();

    loop {
        let page = list(request.clone()).await?;
        let cursor = page.data.last().map(|item| id_of(item).to_string());
        items.extend(page.data);

        match cursor {
            Some(last_id) if page.has_more => request = request.after(last_id),
            _ => break,
        }
    }

    Ok(items)
}

/// Fetch every customer.
pub async fn fetch_customers<P>(provider: &P) -> Result<Vec<CustomerRecord>, FetchError>
where
    P: BillingProvider + ?Sized,
{
    let customers = collect_pages(|page| provider.list_customers(page), |c: &Customer| c.id.as_str())
        .await
        .map_err(FetchError::new(Resource::Customers))?;

    tracing::debug!(count = customers.len(), "Fetched customers");
    Ok(customers.into_iter().map(CustomerRecord::from).collect())
}

/// Fetch every active product joined with its first active price.
///
/// Products without an active price are skipped.
pub async fn fetch_products_with_prices<P>(provider: &P) -> Result<Vec<ProductRecord>, FetchError>
where
    P: BillingProvider + ?Sized,
{
    let products = collect_pages(
        |page| provider.list_products(ActiveFilter::ActiveOnly, page),
        |p: &Product| p.id.as_str(),
    )
    .await
    .map_err(FetchError::new(Resource::Products))?;

    let mut records = Vec::with_capacity(products.len());
    for product in products {
        let prices = provider
            .list_prices(&product.id, ActiveFilter::ActiveOnly, PageRequest::first(1))
            .await
            .map_err(FetchError::new(Resource::Products))?;

        match prices.data.into_iter().next() {
            Some(price) => records.push(ProductRecord::with_price(product, price)),
            None => tracing::debug!(product_id = %product.id, "Skipping product without an active price"),
        }
    }

    tracing::debug!(count = records.len(), "Fetched products");
    Ok(records)
}

/// Fetch every coupon, keyed by ID.
pub async fn fetch_coupons<P>(provider: &P) -> Result<HashMap<String, CouponRecord>, FetchError>
where
    P: BillingProvider + ?Sized,
{
    let coupons = collect_pages(|page| provider.list_coupons(page), |c: &Coupon| c.id.as_str())
        .await
        .map_err(FetchError::new(Resource::Coupons))?;

    tracing::debug!(count = coupons.len(), "Fetched coupons");
    Ok(coupons
        .into_iter()
        .map(|coupon| (coupon.id.clone(), CouponRecord::from(coupon)))
        .collect())
}
