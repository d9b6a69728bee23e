//! Scriptable in-memory [`BillingProvider`].
//!
//! Seed it with customers, products, prices and coupons, script failures per
//! operation, then assert on call counts and on the documents it was asked to
//! create.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::provider::{
    ActiveFilter, BillingProvider, Coupon, CreateCustomerRequest, CreateInvoiceItemRequest,
    CreateInvoiceRequest, Customer, Invoice, InvoiceItem, Page, PageRequest, Price, Product,
    ProviderError, ProviderResult,
};

/// A provider operation, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCustomers,
    ListProducts,
    ListPrices,
    ListCoupons,
    GetCustomer,
    GetPrice,
    CreateCustomer,
    CreateInvoice,
    CreateInvoiceItem,
    SendInvoice,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::ListCustomers => "list_customers",
            Self::ListProducts => "list_products",
            Self::ListPrices => "list_prices",
            Self::ListCoupons => "list_coupons",
            Self::GetCustomer => "get_customer",
            Self::GetPrice => "get_price",
            Self::CreateCustomer => "create_customer",
            Self::CreateInvoice => "create_invoice",
            Self::CreateInvoiceItem => "create_invoice_item",
            Self::SendInvoice => "send_invoice",
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    /// Calls that succeed before the failure kicks in.
    after: u64,
    error: ProviderError,
}

/// Mock billing provider for tests.
#[derive(Debug, Default)]
pub struct MockProvider {
    customers: RwLock<Vec<Customer>>,
    products: RwLock<Vec<Product>>,
    prices: RwLock<Vec<Price>>,
    coupons: RwLock<Vec<Coupon>>,

    failures: RwLock<HashMap<Operation, ScriptedFailure>>,
    calls: RwLock<HashMap<Operation, u64>>,

    created_customers: RwLock<Vec<CreateCustomerRequest>>,
    created_invoices: RwLock<Vec<(String, CreateInvoiceRequest)>>,
    created_items: RwLock<Vec<CreateInvoiceItemRequest>>,
    sent_invoices: RwLock<Vec<String>>,

    id_counter: AtomicU64,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, f: impl FnOnce(&mut T)) {
    f(&mut lock.write().unwrap_or_else(PoisonError::into_inner));
}

/// Cut one page out of `items`, honouring the cursor and limit.
fn paginate<T: Clone>(items: &[T], page: &PageRequest, id_of: fn(&T) -> &str) -> Page<T> {
    let start = match page.starting_after.as_deref() {
        Some(cursor) => items
            .iter()
            .position(|item| id_of(item) == cursor)
            .map_or(items.len(), |idx| idx + 1),
        None => 0,
    };
    let end = (start + usize::from(page.limit)).min(items.len());

    Page {
        data: items[start..end].to_vec(),
        has_more: end < items.len(),
    }
}

impl MockProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a customer.
    #[must_use]
    pub fn with_customer(self, customer: Customer) -> Self {
        write(&self.customers, |c| c.push(customer));
        self
    }

    /// Seed a product.
    #[must_use]
    pub fn with_product(self, product: Product) -> Self {
        write(&self.products, |p| p.push(product));
        self
    }

    /// Seed a price.
    #[must_use]
    pub fn with_price(self, price: Price) -> Self {
        write(&self.prices, |p| p.push(price));
        self
    }

    /// Seed a coupon.
    #[must_use]
    pub fn with_coupon(self, coupon: Coupon) -> Self {
        write(&self.coupons, |c| c.push(coupon));
        self
    }

    /// Replace the customer list, as if changed on the provider side.
    pub fn set_customers(&self, customers: Vec<Customer>) {
        write(&self.customers, |c| *c = customers);
    }

    /// Replace the product list.
    pub fn set_products(&self, products: Vec<Product>) {
        write(&self.products, |p| *p = products);
    }

    /// Replace the coupon list.
    pub fn set_coupons(&self, coupons: Vec<Coupon>) {
        write(&self.coupons, |c| *c = coupons);
    }

    /// Make every call to `operation` fail with a 500 error.
    pub fn fail_on(&self, operation: Operation) {
        self.fail_with(operation, 0, ProviderError::api(operation.name(), "scripted failure", 500));
    }

    /// Let `successes` calls to `operation` through, then fail the rest.
    pub fn fail_after(&self, operation: Operation, successes: u64) {
        self.fail_with(
            operation,
            successes,
            ProviderError::api(operation.name(), "scripted failure", 500),
        );
    }

    /// Fail `operation` with a specific error after `successes` calls.
    pub fn fail_with(&self, operation: Operation, successes: u64, error: ProviderError) {
        write(&self.failures, |f| {
            f.insert(operation, ScriptedFailure { after: successes, error });
        });
    }

    /// Stop failing `operation`.
    pub fn clear_failure(&self, operation: Operation) {
        write(&self.failures, |f| {
            f.remove(&operation);
        });
    }

    /// Number of calls made to `operation` so far.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> u64 {
        read(&self.calls).get(&operation).copied().unwrap_or(0)
    }

    /// Customer creation requests received.
    #[must_use]
    pub fn created_customers(&self) -> Vec<CreateCustomerRequest> {
        read(&self.created_customers)
    }

    /// Invoice creation requests received, with the ID assigned to each.
    #[must_use]
    pub fn created_invoices(&self) -> Vec<(String, CreateInvoiceRequest)> {
        read(&self.created_invoices)
    }

    /// Invoice item creation requests received.
    #[must_use]
    pub fn created_items(&self) -> Vec<CreateInvoiceItemRequest> {
        read(&self.created_items)
    }

    /// IDs of invoices sent.
    #[must_use]
    pub fn sent_invoices(&self) -> Vec<String> {
        read(&self.sent_invoices)
    }

    /// Count the call and return the scripted failure, if one is due.
    fn record(&self, operation: Operation) -> ProviderResult<()> {
        let mut previous = 0;
        write(&self.calls, |calls| {
            let count = calls.entry(operation).or_insert(0);
            previous = *count;
            *count += 1;
        });

        match read(&self.failures).get(&operation) {
            Some(failure) if previous >= failure.after => Err(failure.error.clone()),
            _ => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_mock_{}", prefix, self.id_counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl BillingProvider for MockProvider {
    async fn list_customers(&self, page: PageRequest) -> ProviderResult<Page<Customer>> {
        self.record(Operation::ListCustomers)?;
        Ok(paginate(&read(&self.customers), &page, |c: &Customer| c.id.as_str()))
    }

    async fn list_products(
        &self,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Product>> {
        self.record(Operation::ListProducts)?;
        let products: Vec<Product> = read(&self.products)
            .into_iter()
            .filter(|p| filter == ActiveFilter::Any || p.active)
            .collect();
        Ok(paginate(&products, &page, |p: &Product| p.id.as_str()))
    }

    async fn list_prices(
        &self,
        product_id: &str,
        filter: ActiveFilter,
        page: PageRequest,
    ) -> ProviderResult<Page<Price>> {
        self.record(Operation::ListPrices)?;
        let prices: Vec<Price> = read(&self.prices)
            .into_iter()
            .filter(|p| p.product_id == product_id)
            .filter(|p| filter == ActiveFilter::Any || p.active)
            .collect();
        Ok(paginate(&prices, &page, |p: &Price| p.id.as_str()))
    }

    async fn list_coupons(&self, page: PageRequest) -> ProviderResult<Page<Coupon>> {
        self.record(Operation::ListCoupons)?;
        Ok(paginate(&read(&self.coupons), &page, |c: &Coupon| c.id.as_str()))
    }

    async fn get_customer(&self, customer_id: &str) -> ProviderResult<Customer> {
        self.record(Operation::GetCustomer)?;
        read(&self.customers)
            .into_iter()
            .find(|c| c.id == customer_id)
            .ok_or_else(|| ProviderError::not_found("get_customer", customer_id))
    }

    async fn get_price(&self, price_id: &str) -> ProviderResult<Price> {
        self.record(Operation::GetPrice)?;
        read(&self.prices)
            .into_iter()
            .find(|p| p.id == price_id)
            .ok_or_else(|| ProviderError::not_found("get_price", price_id))
    }

    async fn create_customer(&self, request: CreateCustomerRequest) -> ProviderResult<Customer> {
        self.record(Operation::CreateCustomer)?;
        let customer = Customer {
            id: self.next_id("cus"),
            name: Some(request.name.clone()),
            email: Some(request.email.clone()),
            metadata: request.metadata.clone(),
        };
        write(&self.customers, |c| c.push(customer.clone()));
        write(&self.created_customers, |c| c.push(request));
        Ok(customer)
    }

    async fn create_invoice(&self, request: CreateInvoiceRequest) -> ProviderResult<Invoice> {
        self.record(Operation::CreateInvoice)?;
        let invoice = Invoice {
            id: self.next_id("in"),
            customer_id: request.customer_id.clone(),
            status: Some("draft".to_string()),
        };
        write(&self.created_invoices, |i| i.push((invoice.id.clone(), request)));
        Ok(invoice)
    }

    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItemRequest,
    ) -> ProviderResult<InvoiceItem> {
        self.record(Operation::CreateInvoiceItem)?;
        let item = InvoiceItem {
            id: self.next_id("ii"),
            invoice_id: Some(request.invoice_id.clone()),
        };
        write(&self.created_items, |i| i.push(request));
        Ok(item)
    }

    async fn send_invoice(&self, invoice_id: &str) -> ProviderResult<Invoice> {
        self.record(Operation::SendInvoice)?;
        let (id, request) = read(&self.created_invoices)
            .into_iter()
            .find(|(id, _)| id == invoice_id)
            .ok_or_else(|| ProviderError::not_found("send_invoice", invoice_id))?;

        write(&self.sent_invoices, |s| s.push(id.clone()));
        Ok(Invoice {
            id,
            customer_id: request.customer_id,
            status: Some("open".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_pagination_follows_cursor() {
        let mock = MockProvider::new()
            .with_customer(fixtures::customer("cus_1", "A", false))
            .with_customer(fixtures::customer("cus_2", "B", false))
            .with_customer(fixtures::customer("cus_3", "C", true));

        let first = mock.list_customers(PageRequest::first(2)).await.unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_more);

        let second = mock
            .list_customers(PageRequest::first(2).after("cus_2"))
            .await
            .unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].id, "cus_3");
        assert!(!second.has_more);
        assert_eq!(mock.calls(Operation::ListCustomers), 2);
    }

    #[tokio::test]
    async fn test_fail_after_lets_earlier_calls_through() {
        let mock = MockProvider::new().with_coupon(fixtures::percent_coupon("c", 10.0));
        mock.fail_after(Operation::ListCoupons, 1);

        assert!(mock.list_coupons(PageRequest::default()).await.is_ok());
        assert!(mock.list_coupons(PageRequest::default()).await.is_err());

        mock.clear_failure(Operation::ListCoupons);
        assert!(mock.list_coupons(PageRequest::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_price_listing_filters_by_product_and_active() {
        let mock = MockProvider::new()
            .with_price(Price {
                active: false,
                ..fixtures::price("price_old", "prod_1", 400, "usd")
            })
            .with_price(fixtures::price("price_1", "prod_1", 500, "usd"))
            .with_price(fixtures::price("price_2", "prod_2", 900, "usd"));

        let page = mock
            .list_prices("prod_1", ActiveFilter::ActiveOnly, PageRequest::first(1))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, "price_1");
    }

    #[tokio::test]
    async fn test_send_unknown_invoice_is_not_found() {
        let mock = MockProvider::new();
        let err = mock.send_invoice("in_missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
