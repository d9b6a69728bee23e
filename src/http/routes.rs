//! Request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::cache::{CouponRecord, CustomerView, ProductRecord};
use crate::customers::NewCustomer;
use crate::desk::BillingDesk;
use crate::error::{DeskError, Result};
use crate::health::{HealthResponse, cache_health};
use crate::invoicing::InvoiceRequest;
use crate::provider::BillingProvider;

pub type DeskState<P> = State<Arc<BillingDesk<P>>>;

/// Body of a successful invoice creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceCreated {
    pub invoice_id: String,
}

/// Body of an accepted refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshAccepted {
    pub message: &'static str,
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| DeskError::bad_request(rejection.body_text()))
}

pub async fn health<P: BillingProvider>(State(desk): DeskState<P>) -> HealthResponse {
    cache_health(&desk.status(), desk.refresh_interval(), chrono::Utc::now())
}

pub async fn list_customers<P: BillingProvider>(State(desk): DeskState<P>) -> Json<Vec<CustomerView>> {
    Json(desk.customers())
}

pub async fn create_customer<P: BillingProvider>(
    State(desk): DeskState<P>,
    body: std::result::Result<Json<NewCustomer>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let customer = json_body(body)?;
    if customer.name.trim().is_empty() || customer.email.trim().is_empty() {
        return Err(DeskError::bad_request("name and email are required"));
    }

    let view = desk.create_customer(customer).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_products<P: BillingProvider>(State(desk): DeskState<P>) -> Json<Vec<ProductRecord>> {
    Json(desk.products())
}

pub async fn list_coupons<P: BillingProvider>(
    State(desk): DeskState<P>,
) -> Json<HashMap<String, CouponRecord>> {
    Json(desk.coupons())
}

pub async fn get_coupon<P: BillingProvider>(
    State(desk): DeskState<P>,
    Path(id): Path<String>,
) -> Result<Json<CouponRecord>> {
    Ok(Json(desk.coupon(&id)?))
}

pub async fn create_invoice<P: BillingProvider>(
    State(desk): DeskState<P>,
    body: std::result::Result<Json<InvoiceRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(body)?;
    let invoice_id = desk.create_invoice(request).await?;
    Ok((StatusCode::CREATED, Json(InvoiceCreated { invoice_id })))
}

pub async fn force_refresh<P: BillingProvider>(State(desk): DeskState<P>) -> impl IntoResponse {
    desk.force_refresh();
    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            message: "refresh of customers and products started",
        }),
    )
}
