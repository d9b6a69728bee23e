//! The in-memory catalogue snapshot.
//!
//! Each field lives behind its own lock and holds an `Arc` of the current
//! value. Readers clone the `Arc` under a short read lock; writers swap it
//! under the write lock. Fields are replaced independently of each other.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::records::{CouponRecord, CustomerRecord, ProductRecord};

/// Errors from cache lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Coupon not found: {id}")]
    NotFound { id: String },
}

struct Slot<T> {
    value: Arc<T>,
    replaced_at: Option<DateTime<Utc>>,
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: Arc::new(T::default()),
            replaced_at: None,
        }
    }
}

/// One lock-guarded cache field.
struct Field<T>(RwLock<Slot<T>>);

impl<T: Default> Default for Field<T> {
    fn default() -> Self {
        Self(RwLock::new(Slot::default()))
    }
}

impl<T> Field<T> {
    // A writer can't leave a slot half-written, so a poisoned lock still
    // holds a usable value.
    fn get(&self) -> Arc<T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).value.clone()
    }

    fn replace(&self, value: T) {
        let mut slot = self.0.write().unwrap_or_else(PoisonError::into_inner);
        slot.value = Arc::new(value);
        slot.replaced_at = Some(Utc::now());
    }

    fn status(&self, count: impl Fn(&T) -> usize) -> FieldStatus {
        let slot = self.0.read().unwrap_or_else(PoisonError::into_inner);
        FieldStatus {
            entries: count(&slot.value),
            replaced_at: slot.replaced_at,
        }
    }
}

/// Entry count and last replacement time for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatus {
    pub entries: usize,
    pub replaced_at: Option<DateTime<Utc>>,
}

/// Snapshot of the cache's state for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub ready: bool,
    pub customers: FieldStatus,
    pub products: FieldStatus,
    pub coupons: FieldStatus,
}

/// Latest known customers, products and coupons.
#[derive(Default)]
pub struct CacheStore {
    customers: Field<Vec<CustomerRecord>>,
    products: Field<Vec<ProductRecord>>,
    coupons: Field<HashMap<String, CouponRecord>>,
    ready: AtomicBool,
}

impl CacheStore {
    /// Create an empty, not-ready store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current customer list.
    pub fn customers(&self) -> Arc<Vec<CustomerRecord>> {
        self.customers.get()
    }

    /// Current product list.
    pub fn products(&self) -> Arc<Vec<ProductRecord>> {
        self.products.get()
    }

    /// Look up a single coupon.
    pub fn coupon(&self, id: &str) -> Result<CouponRecord, CacheError> {
        self.coupons
            .get()
            .get(id)
            .cloned()
            .ok_or_else(|| CacheError::NotFound { id: id.to_string() })
    }

    /// Current coupon mapping.
    pub fn coupons(&self) -> Arc<HashMap<String, CouponRecord>> {
        self.coupons.get()
    }

    pub fn replace_customers(&self, customers: Vec<CustomerRecord>) {
        self.customers.replace(customers);
    }

    pub fn replace_products(&self, products: Vec<ProductRecord>) {
        self.products.replace(products);
    }

    pub fn replace_coupons(&self, coupons: HashMap<String, CouponRecord>) {
        self.coupons.replace(coupons);
    }

    /// Mark the store as populated.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether an initial population has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Entry counts and replacement times per field.
    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            ready: self.is_ready(),
            customers: self.customers.status(Vec::len),
            products: self.products.status(Vec::len),
            coupons: self.coupons.status(HashMap::len),
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("status", &self.status())
            .finish()
    }
}
