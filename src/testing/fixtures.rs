//! Fixtures for provider objects.
//!
//! Small constructors for the Stripe objects the desk reads, plus a seeded
//! catalogue used across the integration tests.

use std::collections::HashMap;

use uuid::Uuid;

use super::MockProvider;
use crate::cache::META_INDEPENDENT;
use crate::provider::{Coupon, Customer, Price, Product};

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake email address
    pub fn email() -> String {
        format!("test-{}@example.com", Uuid::new_v4().simple())
    }

    /// Generate a fake display name
    pub fn name() -> String {
        format!("Test Customer {}", &Uuid::new_v4().simple().to_string()[..8])
    }
}

/// A customer, with `independent` metadata set from the flag.
pub fn customer(id: &str, name: &str, independent: bool) -> Customer {
    let mut metadata = HashMap::new();
    metadata.insert(META_INDEPENDENT.to_string(), independent.to_string());

    Customer {
        id: id.to_string(),
        name: Some(name.to_string()),
        email: Some(format!("{}@example.com", id)),
        metadata,
    }
}

/// An active product.
pub fn product(id: &str, name: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        active: true,
    }
}

/// An active price for `product_id`.
pub fn price(id: &str, product_id: &str, unit_amount: i64, currency: &str) -> Price {
    Price {
        id: id.to_string(),
        product_id: product_id.to_string(),
        unit_amount: Some(unit_amount),
        currency: Some(currency.to_string()),
        active: true,
    }
}

/// A valid percentage coupon.
pub fn percent_coupon(id: &str, percent_off: f64) -> Coupon {
    Coupon {
        id: id.to_string(),
        name: Some(id.to_string()),
        percent_off: Some(percent_off),
        amount_off: None,
        currency: None,
        valid: true,
    }
}

/// A valid fixed-amount coupon.
pub fn amount_coupon(id: &str, amount_off: i64, currency: &str) -> Coupon {
    Coupon {
        id: id.to_string(),
        name: Some(id.to_string()),
        percent_off: None,
        amount_off: Some(amount_off),
        currency: Some(currency.to_string()),
        valid: true,
    }
}

/// A small catalogue:
///
/// - `cus_1` (independent) and `cus_2`
/// - `prod_1` priced by `price_1` at 500 usd
/// - `prod_2` priced by `price_2` at 1200 usd
/// - `prod_3` with no active price, and inactive `prod_4`
/// - the four discount coupons
pub fn catalogue() -> MockProvider {
    MockProvider::new()
        .with_customer(customer("cus_1", "Ada", true))
        .with_customer(customer("cus_2", "Grace", false))
        .with_product(product("prod_1", "Mastering"))
        .with_product(product("prod_2", "Mixing"))
        .with_product(product("prod_3", "Consultation"))
        .with_product(Product {
            active: false,
            ..product("prod_4", "Retired")
        })
        .with_price(price("price_1", "prod_1", 500, "usd"))
        .with_price(price("price_2", "prod_2", 1200, "usd"))
        .with_price(Price {
            active: false,
            ..price("price_3", "prod_3", 800, "usd")
        })
        .with_coupon(percent_coupon("bulk_tier_1", 5.0))
        .with_coupon(percent_coupon("bulk_tier_2", 10.0))
        .with_coupon(percent_coupon("bulk_tier_3", 15.0))
        .with_coupon(amount_coupon("independent_artist", 200, "usd"))
}
