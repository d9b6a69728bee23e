//! Testing utilities for the billing desk
//!
//! - [`MockProvider`]: a scriptable in-memory billing provider
//! - [`fixtures`]: provider objects and a seeded catalogue
//! - [`get`] / [`post`]: in-process HTTP scenarios against the router
//!
//! # Example
//!
//! ```rust,ignore
//! use billdesk::testing::{self, Operation, fixtures};
//!
//! let provider = fixtures::catalogue();
//! provider.fail_on(Operation::ListCoupons);
//! ```

pub mod fixtures;
mod http;
mod mock_provider;

pub use fixtures::fake;
pub use http::{Scenario, ScenarioAssert, get, post};
pub use mock_provider::{MockProvider, Operation};
