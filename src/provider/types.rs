//! Provider-side resource and request types.
//!
//! These mirror the subset of Stripe objects the desk reads and writes. They
//! are deliberately flat: optional Stripe fields are normalised by the client
//! implementation so the rest of the crate never deals with expandable or
//! nullable wire shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stripe's maximum page size for list endpoints.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Cursor-based page request, matching Stripe's list pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of items to return (1-100).
    pub limit: u8,
    /// ID of the last item from the previous page.
    pub starting_after: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: MAX_PAGE_SIZE,
            starting_after: None,
        }
    }
}

impl PageRequest {
    /// First page with the given size. Values are clamped to 1-100.
    #[must_use]
    pub fn first(limit: u8) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            starting_after: None,
        }
    }

    /// The request for the page after `last_id`.
    #[must_use]
    pub fn after(&self, last_id: impl Into<String>) -> Self {
        Self {
            limit: self.limit,
            starting_after: Some(last_id.into()),
        }
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in this page.
    pub data: Vec<T>,
    /// Whether more items follow.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(data: Vec<T>) -> Self {
        Self { data, has_more: false }
    }
}

/// A provider customer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Customer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// A provider product.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// A provider price.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Price {
    pub id: String,
    /// ID of the product this price belongs to.
    pub product_id: String,
    /// Unit amount in the smallest currency unit, if the price has one.
    pub unit_amount: Option<i64>,
    /// Three-letter ISO currency code (lowercase).
    pub currency: Option<String>,
    pub active: bool,
}

/// A provider coupon.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coupon {
    pub id: String,
    pub name: Option<String>,
    pub percent_off: Option<f64>,
    pub amount_off: Option<i64>,
    pub currency: Option<String>,
    pub valid: bool,
}

/// A provider invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    /// Stripe status string (`draft`, `open`, `paid`, ...), if reported.
    pub status: Option<String>,
}

/// A provider invoice item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: Option<String>,
}

/// Product listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveFilter {
    /// Only objects currently marked active.
    #[default]
    ActiveOnly,
    /// Everything, active or not.
    Any,
}

impl ActiveFilter {
    /// The `active` query parameter, if any.
    #[must_use]
    pub fn as_param(self) -> Option<bool> {
        match self {
            Self::ActiveOnly => Some(true),
            Self::Any => None,
        }
    }
}

/// Request to create a provider customer.
#[derive(Debug, Clone, Default)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub email: String,
    pub metadata: HashMap<String, String>,
}

/// How Stripe collects payment for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMethod {
    /// Charge the default payment method automatically.
    ChargeAutomatically,
    /// Email the invoice to the customer with payment instructions.
    SendInvoice,
}

impl CollectionMethod {
    /// The Stripe API string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChargeAutomatically => "charge_automatically",
            Self::SendInvoice => "send_invoice",
        }
    }
}

/// Request to create an invoice header.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvoiceRequest {
    pub customer_id: String,
    pub auto_advance: bool,
    pub collection_method: CollectionMethod,
    pub days_until_due: u32,
    pub description: String,
    /// Coupon IDs to apply, in order.
    pub discounts: Vec<String>,
}

/// Request to create an invoice item attached to an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoiceItemRequest {
    pub customer_id: String,
    pub invoice_id: String,
    pub currency: String,
    pub unit_amount: i64,
    pub product_id: String,
    /// Passed through unvalidated; the provider decides what to do with it.
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamping() {
        assert_eq!(PageRequest::first(0).limit, 1);
        assert_eq!(PageRequest::first(250).limit, 100);
        assert_eq!(PageRequest::default().limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_request_after_keeps_limit() {
        let next = PageRequest::first(10).after("cus_9");
        assert_eq!(next.limit, 10);
        assert_eq!(next.starting_after.as_deref(), Some("cus_9"));
    }

    #[test]
    fn test_collection_method_str() {
        assert_eq!(CollectionMethod::SendInvoice.as_str(), "send_invoice");
        assert_eq!(CollectionMethod::ChargeAutomatically.as_str(), "charge_automatically");
    }

    #[test]
    fn test_active_filter_param() {
        assert_eq!(ActiveFilter::ActiveOnly.as_param(), Some(true));
        assert_eq!(ActiveFilter::Any.as_param(), None);
    }
}
