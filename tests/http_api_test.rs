//! HTTP API against a desk backed by the mock provider.

use std::sync::Arc;

use axum::{Router, http::StatusCode};
use serde_json::{Value, json};

use billdesk::testing::{self, MockProvider, Operation, fixtures};
use billdesk::{BillingDesk, ConfigBuilder, InvoiceRequest, http::InvoiceCreated};

async fn started(provider: MockProvider) -> (Router, Arc<BillingDesk<MockProvider>>, Arc<MockProvider>) {
    let provider = Arc::new(provider);
    let config = ConfigBuilder::new().build().unwrap();
    let desk = Arc::new(BillingDesk::new(provider.clone(), &config));
    desk.start().await.unwrap();
    (billdesk::http::router(desk.clone()), desk, provider)
}

#[tokio::test]
async fn test_health_reports_readiness() {
    let provider = Arc::new(fixtures::catalogue());
    let config = ConfigBuilder::new().build().unwrap();
    let desk = Arc::new(BillingDesk::new(provider, &config));
    let app = billdesk::http::router(desk.clone());

    testing::get(app.clone(), "/health")
        .execute()
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    desk.start().await.unwrap();
    let body: Value = testing::get(app, "/health").execute().await.assert_ok().json().await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ready"], true);
    assert_eq!(body["checks"][1]["name"], "products");
    assert_eq!(body["checks"][1]["entries"], 2);

    desk.shutdown().await;
}

#[tokio::test]
async fn test_list_endpoints() {
    let (app, desk, _) = started(fixtures::catalogue()).await;

    let customers: Value = testing::get(app.clone(), "/customers")
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(customers.as_array().unwrap().len(), 2);
    assert_eq!(customers[0]["id"], "cus_1");
    assert_eq!(customers[0]["independent"], true);
    assert_eq!(customers[1]["independent"], false);

    let products: Value = testing::get(app.clone(), "/products")
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(products[0]["priceID"], "price_1");
    assert_eq!(products[0]["priceCents"], 500);

    let coupons: Value = testing::get(app, "/coupons").execute().await.assert_ok().json().await;
    assert_eq!(coupons.as_object().unwrap().len(), 4);
    assert_eq!(coupons["bulk_tier_3"]["percentOff"], 15.0);

    desk.shutdown().await;
}

#[tokio::test]
async fn test_single_coupon() {
    let (app, desk, _) = started(fixtures::catalogue()).await;

    let coupon: Value = testing::get(app.clone(), "/coupons/independent_artist")
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(coupon["amountOff"], 200);
    assert_eq!(coupon["currency"], "usd");
    assert_eq!(coupon["valid"], true);

    let missing: Value = testing::get(app, "/coupons/gold")
        .execute()
        .await
        .assert_not_found()
        .json()
        .await;
    assert_eq!(missing["error"], "Coupon not found: gold");

    desk.shutdown().await;
}

#[tokio::test]
async fn test_create_invoice() {
    let (app, desk, provider) = started(fixtures::catalogue()).await;

    let created: InvoiceCreated = testing::post(app, "/invoices")
        .json_body(&InvoiceRequest {
            customer_id: "cus_1".to_string(),
            price_id: "price_1".to_string(),
            quantity: 6,
            description: "EP mastering".to_string(),
        })
        .execute()
        .await
        .assert_created()
        .json()
        .await;

    assert_eq!(provider.sent_invoices(), vec![created.invoice_id]);
    desk.shutdown().await;
}

#[tokio::test]
async fn test_create_invoice_errors() {
    let (app, desk, provider) = started(fixtures::catalogue()).await;

    testing::post(app.clone(), "/invoices")
        .json_body(&json!({"customerId": "cus_404", "priceId": "price_1", "quantity": 1}))
        .execute()
        .await
        .assert_not_found();

    testing::post(app.clone(), "/invoices")
        .raw_json(r#"{"customerId": "cus_1""#)
        .execute()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    provider.fail_on(Operation::CreateInvoice);
    let body: Value = testing::post(app, "/invoices")
        .json_body(&json!({"customerId": "cus_1", "priceId": "price_1", "quantity": 3}))
        .execute()
        .await
        .assert_status(StatusCode::BAD_GATEWAY)
        .json()
        .await;
    assert!(body["error"].as_str().unwrap().contains("Failed to create invoice"));

    desk.shutdown().await;
}

#[tokio::test]
async fn test_create_customer_then_refresh() {
    let (app, desk, _) = started(fixtures::catalogue()).await;

    let created: Value = testing::post(app.clone(), "/customers")
        .json_body(&json!({
            "name": testing::fake::name(),
            "email": testing::fake::email(),
            "independent": true
        }))
        .execute()
        .await
        .assert_created()
        .json()
        .await;
    assert_eq!(created["independent"], true);

    // Not cached until a refresh runs.
    assert_eq!(desk.customers().len(), 2);

    testing::post(app, "/cache/refresh")
        .execute()
        .await
        .assert_status(StatusCode::ACCEPTED);

    for _ in 0..100 {
        if desk.customers().len() == 3 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(desk.customers().iter().any(|c| c.id == created["id"]));

    desk.shutdown().await;
}

#[tokio::test]
async fn test_create_customer_validation() {
    let (app, desk, provider) = started(fixtures::catalogue()).await;

    testing::post(app, "/customers")
        .json_body(&json!({"name": " ", "email": "x@example.com"}))
        .execute()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(Operation::CreateCustomer), 0);

    desk.shutdown().await;
}

#[tokio::test]
async fn test_health_with_very_long_refresh_interval() {
    let provider = Arc::new(fixtures::catalogue());
    let config = ConfigBuilder::new()
        .with_refresh_interval(std::time::Duration::from_secs(u64::MAX / 2 + 1))
        .build()
        .unwrap();
    let desk = Arc::new(BillingDesk::new(provider, &config));
    desk.start().await.unwrap();

    let body: Value = testing::get(billdesk::http::router(desk.clone()), "/health")
        .execute()
        .await
        .assert_ok()
        .json()
        .await;
    assert_eq!(body["status"], "healthy");

    desk.shutdown().await;
}
