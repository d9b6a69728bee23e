//! HTTP surface over the billing desk.
//!
//! | Method | Path              | Response                         |
//! |--------|-------------------|----------------------------------|
//! | GET    | `/health`         | cache readiness (503 until ready) |
//! | GET    | `/customers`      | cached customers                 |
//! | POST   | `/customers`      | 201, created customer            |
//! | GET    | `/products`       | cached products with prices      |
//! | GET    | `/coupons`        | cached coupons by ID             |
//! | GET    | `/coupons/{id}`   | one coupon, or 404               |
//! | POST   | `/invoices`       | 201, `{ "invoiceId": ... }`      |
//! | POST   | `/cache/refresh`  | 202, refresh runs in background  |

pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::desk::BillingDesk;
use crate::provider::BillingProvider;

pub use routes::{InvoiceCreated, RefreshAccepted};

/// Build the router for `desk`.
pub fn router<P: BillingProvider>(desk: Arc<BillingDesk<P>>) -> Router {
    Router::new()
        .route("/health", get(routes::health::<P>))
        .route(
            "/customers",
            get(routes::list_customers::<P>).post(routes::create_customer::<P>),
        )
        .route("/products", get(routes::list_products::<P>))
        .route("/coupons", get(routes::list_coupons::<P>))
        .route("/coupons/{id}", get(routes::get_coupon::<P>))
        .route("/invoices", post(routes::create_invoice::<P>))
        .route("/cache/refresh", post(routes::force_refresh::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(desk)
}
