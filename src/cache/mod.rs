//! In-memory cache of the provider catalogue.
//!
//! [`CacheStore`] is shared behind an `Arc` between the refresh engine, which
//! writes it, and everything that serves reads.

mod records;
mod store;

pub(crate) use records::is_independent;
pub use records::{CouponRecord, CustomerRecord, CustomerView, META_INDEPENDENT, ProductRecord};
pub use store::{CacheError, CacheStatus, CacheStore, FieldStatus};
