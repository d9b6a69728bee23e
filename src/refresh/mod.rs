//! Cache population from the billing provider.
//!
//! - [`RefreshEngine::initial_refresh`]: all-or-nothing startup population
//! - [`RefreshEngine::spawn_periodic`]: background refresh on a fixed interval,
//!   tolerating partial failure
//! - [`RefreshEngine::force_refresh`]: on-demand customers and products refresh

mod engine;
pub mod fetch;

pub use engine::{CycleReport, ForcedRefreshReport, RefreshEngine, RefreshError, RefreshHandle};
pub use fetch::{FetchError, Resource};
