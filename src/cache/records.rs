//! Cached record types and their conversion from provider objects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::provider::{Coupon, Customer, Price, Product};

/// Metadata key marking a customer as an independent artist.
pub const META_INDEPENDENT: &str = "independent";

/// A cached customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub metadata: HashMap<String, String>,
}

impl CustomerRecord {
    /// True iff metadata `independent` is exactly `"true"`.
    #[must_use]
    pub fn is_independent(&self) -> bool {
        is_independent(&self.metadata)
    }
}

/// The independent flag derived from a metadata map.
pub(crate) fn is_independent(metadata: &HashMap<String, String>) -> bool {
    metadata.get(META_INDEPENDENT).is_some_and(|v| v == "true")
}

impl From<Customer> for CustomerRecord {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.unwrap_or_default(),
            email: customer.email.unwrap_or_default(),
            metadata: customer.metadata,
        }
    }
}

/// A cached product joined with its chosen active price.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "priceID")]
    pub price_id: String,
    /// Unit amount in minor currency units.
    pub price_cents: i64,
}

impl ProductRecord {
    /// Join a product with its price.
    #[must_use]
    pub fn with_price(product: Product, price: Price) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price_id: price.id,
            price_cents: price.unit_amount.unwrap_or(0),
        }
    }
}

/// A cached coupon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRecord {
    pub id: String,
    pub name: String,
    pub percent_off: f64,
    pub amount_off: i64,
    pub currency: String,
    pub valid: bool,
}

impl From<Coupon> for CouponRecord {
    fn from(coupon: Coupon) -> Self {
        Self {
            id: coupon.id,
            name: coupon.name.unwrap_or_default(),
            percent_off: coupon.percent_off.unwrap_or(0.0),
            amount_off: coupon.amount_off.unwrap_or(0),
            currency: coupon.currency.unwrap_or_default(),
            valid: coupon.valid,
        }
    }
}

/// What callers see of a customer: the metadata flag is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub independent: bool,
}

impl From<&CustomerRecord> for CustomerView {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            independent: record.is_independent(),
        }
    }
}

impl From<Customer> for CustomerView {
    fn from(customer: Customer) -> Self {
        Self::from(&CustomerRecord::from(customer))
    }
}
