//! Refresh engine behaviour against the mock provider, on paused time.

use std::sync::Arc;
use std::time::Duration;

use billdesk::testing::{MockProvider, Operation, fixtures};
use billdesk::{CacheStore, RefreshEngine, Resource};

const INTERVAL: Duration = Duration::from_secs(900);

fn setup() -> (RefreshEngine<MockProvider>, Arc<MockProvider>, Arc<CacheStore>) {
    let provider = Arc::new(fixtures::catalogue());
    let cache = Arc::new(CacheStore::new());
    let engine = RefreshEngine::new(provider.clone(), cache.clone());
    (engine, provider, cache)
}

#[tokio::test]
async fn test_reads_match_initial_fetch() {
    let (engine, _, cache) = setup();
    engine.initial_refresh().await.unwrap();

    let customers = cache.customers();
    assert_eq!(customers.len(), 2);
    assert!(customers[0].is_independent());
    assert!(!customers[1].is_independent());

    let products = cache.products();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].price_id, "price_1");
    assert_eq!(products[0].price_cents, 500);
    assert!(products.iter().all(|p| p.id != "prod_3" && p.id != "prod_4"));

    assert_eq!(cache.coupons().len(), 4);
    assert_eq!(cache.coupon("independent_artist").unwrap().amount_off, 200);
}

#[tokio::test]
async fn test_initial_failure_leaves_store_unready() {
    let (engine, provider, cache) = setup();
    provider.fail_on(Operation::ListPrices);

    assert!(engine.initial_refresh().await.is_err());
    assert!(!cache.is_ready());
    assert!(cache.customers().is_empty());
    assert!(cache.coupons().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_periodic_cycle_waits_one_interval() {
    let (engine, provider, _) = setup();
    engine.initial_refresh().await.unwrap();

    let handle = engine.spawn_periodic(INTERVAL);
    tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
    assert_eq!(provider.calls(Operation::ListCustomers), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(provider.calls(Operation::ListCustomers), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_coupon_failure_keeps_other_fields_fresh() {
    let (engine, provider, cache) = setup();
    engine.initial_refresh().await.unwrap();

    provider.set_customers(vec![fixtures::customer("cus_3", "Hedy", true)]);
    provider.set_products(vec![fixtures::product("prod_2", "Mixing v2")]);
    provider.fail_on(Operation::ListCoupons);

    let handle = engine.spawn_periodic(INTERVAL);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(cache.customers()[0].id, "cus_3");
    assert_eq!(cache.products().len(), 1);
    assert_eq!(cache.products()[0].name, "Mixing v2");
    assert_eq!(cache.coupons().len(), 4);

    // The loop keeps going after the failure.
    provider.clear_failure(Operation::ListCoupons);
    provider.set_coupons(vec![fixtures::percent_coupon("spring_sale", 20.0)]);
    tokio::time::sleep(INTERVAL).await;

    assert_eq!(cache.coupons().len(), 1);
    assert!(cache.coupon("spring_sale").is_ok());
    assert!(!handle.is_finished());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_task_stops_refreshing() {
    let (engine, provider, _) = setup();
    engine.initial_refresh().await.unwrap();

    let handle = engine.spawn_periodic(INTERVAL);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(provider.calls(Operation::ListCoupons), 2);

    handle.shutdown().await;
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(provider.calls(Operation::ListCoupons), 2);
}

#[tokio::test]
async fn test_cycle_report_names_failures() {
    let (engine, provider, _) = setup();
    provider.fail_on(Operation::ListCustomers);
    provider.fail_on(Operation::ListCoupons);

    let report = engine.refresh_cycle().await;
    assert!(!report.is_complete());
    assert_eq!(report.updated, vec![Resource::Products]);
    let failed: Vec<Resource> = report.failed.iter().map(|e| e.resource).collect();
    assert_eq!(failed, vec![Resource::Customers, Resource::Coupons]);
}

#[tokio::test]
async fn test_forced_refresh_one_side_failing() {
    let (engine, provider, cache) = setup();
    engine.initial_refresh().await.unwrap();

    provider.fail_on(Operation::ListCustomers);
    provider.set_products(vec![fixtures::product("prod_1", "Mastering v2")]);
    provider.set_coupons(vec![]);

    let report = engine.force_refresh().await;
    assert!(report.customers.is_err());
    assert_eq!(report.products.unwrap(), 1);

    assert_eq!(cache.customers().len(), 2);
    assert_eq!(cache.products()[0].name, "Mastering v2");
    assert_eq!(cache.coupons().len(), 4);
}

#[tokio::test]
async fn test_pagination_over_large_catalogue() {
    let mut provider = MockProvider::new();
    for n in 0..230 {
        provider = provider.with_coupon(fixtures::percent_coupon(&format!("coupon_{n:03}"), 1.0));
    }
    let provider = Arc::new(provider);
    let cache = Arc::new(CacheStore::new());
    let engine = RefreshEngine::new(provider.clone(), cache.clone());

    engine.initial_refresh().await.unwrap();
    assert_eq!(cache.coupons().len(), 230);
    assert_eq!(provider.calls(Operation::ListCoupons), 3);
}

#[tokio::test]
async fn test_custom_product_ids_are_cached() {
    let provider = Arc::new(
        fixtures::catalogue()
            .with_product(fixtures::product("plan.gold", "Gold plan"))
            .with_price(fixtures::price("price_gold", "plan.gold", 9900, "usd")),
    );
    let cache = Arc::new(CacheStore::new());
    let engine = RefreshEngine::new(provider, cache.clone());

    engine.initial_refresh().await.unwrap();
    let gold = cache.products().iter().find(|p| p.id == "plan.gold").cloned().unwrap();
    assert_eq!(gold.price_id, "price_gold");
}
