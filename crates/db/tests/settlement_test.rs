//! Settlement integration tests against Postgres.
//!
//! Run with `cargo test -p settla-db -- --ignored` and `DATABASE_URL` set.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_wrap)]

mod common;

use chrono::NaiveDate;
use common::{LOCK_TIMEOUT_MS, setup_db, unique};
use futures::future::join_all;
use rust_decimal_macros::dec;
use settla_core::settlement::{
    FeeRate, NewSettlement, OrderInput, Settlement, SettlementCycle, SettlementDetail,
    SettlementError, SettlementFilter, SettlementService, SettlementStatus,
};
use settla_db::PgSettlementStore;
use settla_shared::ClearingConfig;
use settla_shared::types::PageRequest;
use std::sync::Arc;

async fn service() -> SettlementService<PgSettlementStore> {
    let db = setup_db().await;
    let config = ClearingConfig {
        lock_timeout_ms: LOCK_TIMEOUT_MS,
        ..ClearingConfig::default()
    };
    let store = Arc::new(PgSettlementStore::from_config(db, &config));
    SettlementService::new(store, FeeRate::new(dec!(0.006)).unwrap())
}

/// Running totals must equal the sums over the stored details.
fn assert_totals_match(settlement: &Settlement, details: &[SettlementDetail]) {
    assert_eq!(settlement.order_count, details.len() as i64);
    assert_eq!(
        settlement.total_amount,
        details.iter().map(|d| d.order_amount).sum::<i64>()
    );
    assert_eq!(
        settlement.platform_fee,
        details.iter().map(|d| d.platform_fee).sum::<i64>()
    );
    assert_eq!(
        settlement.settlement_amount,
        details.iter().map(|d| d.settlement_amount).sum::<i64>()
    );
}

fn new_settlement(merchant_id: &str) -> NewSettlement {
    NewSettlement {
        merchant_id: merchant_id.to_string(),
        cycle: SettlementCycle::Daily,
        start_date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
    }
}

fn order(order_id: &str, amount: i64) -> OrderInput {
    OrderInput {
        order_id: order_id.to_string(),
        order_no: format!("NO-{order_id}"),
        amount,
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_settlement_lifecycle_credits_merchant() {
    let service = service().await;
    let merchant = unique("M");
    service
        .open_merchant_account(&merchant, FeeRate::new(dec!(0.01)).unwrap())
        .await
        .unwrap();

    let settlement = service.create_settlement(new_settlement(&merchant)).await.unwrap();
    let (a, b) = (unique("A"), unique("B"));
    service
        .add_order_to_settlement(settlement.id, order(&a, 1_000))
        .await
        .unwrap();
    let updated = service
        .add_order_to_settlement(settlement.id, order(&b, 2_000))
        .await
        .unwrap();
    assert_eq!(updated.order_count, 2);
    assert_eq!(updated.total_amount, 3_000);
    assert_eq!(updated.platform_fee, 30);
    assert_eq!(updated.settlement_amount, 2_970);

    let duplicate = service
        .add_order_to_settlement(settlement.id, order(&a, 1_000))
        .await;
    assert!(matches!(duplicate, Err(SettlementError::DuplicateOrder { .. })));

    service.process_settlement(settlement.id).await.unwrap();
    let (completed, account) = service.complete_settlement(settlement.id).await.unwrap();

    assert_eq!(completed.status, SettlementStatus::Completed);
    assert!(completed.settled_at.is_some());
    assert_eq!(account.balance, 2_970);
    assert_eq!(account.total_income, 2_970);

    let details = service.settlement_details(settlement.id).await.unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].order_id, a);
    assert_totals_match(&completed, &details);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_order_settles_once_across_settlements() {
    let service = service().await;
    let merchant = unique("M");
    service
        .open_merchant_account(&merchant, FeeRate::new(dec!(0.01)).unwrap())
        .await
        .unwrap();
    let first = service.create_settlement(new_settlement(&merchant)).await.unwrap();
    let second = service.create_settlement(new_settlement(&merchant)).await.unwrap();
    let shared = unique("O");

    service
        .add_order_to_settlement(first.id, order(&shared, 500))
        .await
        .unwrap();
    let again = service
        .add_order_to_settlement(second.id, order(&shared, 500))
        .await;
    assert!(matches!(
        again,
        Err(SettlementError::DuplicateOrder { settlement_id, .. }) if settlement_id == first.id
    ));

    for id in [first.id, second.id] {
        service.process_settlement(id).await.unwrap();
        service.complete_settlement(id).await.unwrap();
    }
    let account = service.get_merchant_account(&merchant).await.unwrap();
    assert_eq!(account.balance, 495);
    assert!(service.settlement_details(second.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_concurrent_settlements_claim_order_once() {
    let service = Arc::new(service().await);
    let merchant = unique("M");
    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(service.create_settlement(new_settlement(&merchant)).await.unwrap().id);
    }
    let shared = unique("O");

    let tasks = ids.iter().map(|&id| {
        let service = Arc::clone(&service);
        let shared = shared.clone();
        tokio::spawn(async move { service.add_order_to_settlement(id, order(&shared, 1_000)).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(SettlementError::DuplicateOrder { .. })))
    );
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_completion_requires_processing() {
    let service = service().await;
    let merchant = unique("M");
    let settlement = service.create_settlement(new_settlement(&merchant)).await.unwrap();

    let result = service.complete_settlement(settlement.id).await;
    assert!(matches!(result, Err(SettlementError::InvalidTransition { .. })));

    let failed = service
        .fail_settlement(settlement.id, "bank rejected payout")
        .await
        .unwrap();
    assert_eq!(failed.status, SettlementStatus::Failed);
    assert_eq!(failed.fail_reason.as_deref(), Some("bank rejected payout"));
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_concurrent_orders_fold_exactly_once() {
    let service = Arc::new(service().await);
    let merchant = unique("M");
    let settlement = service.create_settlement(new_settlement(&merchant)).await.unwrap();

    // Every order is submitted twice.
    let batch = unique("O");
    let tasks = (0..20).map(|i| {
        let service = Arc::clone(&service);
        let order_id = format!("{batch}_{}", i % 10);
        tokio::spawn(async move {
            service
                .add_order_to_settlement(settlement.id, order(&order_id, 1_000))
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(SettlementError::DuplicateOrder { .. })))
        .count();
    assert_eq!(duplicates, 10);

    let stored = service.get_settlement(settlement.id).await.unwrap();
    assert_eq!(stored.order_count, 10);
    assert_eq!(stored.total_amount, 10_000);
    assert!(stored.is_consistent());
    let details = service.settlement_details(settlement.id).await.unwrap();
    assert_totals_match(&stored, &details);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn test_list_settlements_filters_by_merchant() {
    let service = service().await;
    let merchant = unique("M");
    for _ in 0..3 {
        service.create_settlement(new_settlement(&merchant)).await.unwrap();
    }
    service
        .create_settlement(new_settlement(&unique("OTHER")))
        .await
        .unwrap();

    let filter = SettlementFilter {
        merchant_id: Some(merchant.clone()),
        status: Some(SettlementStatus::Pending),
    };
    let page = service
        .list_settlements(&filter, PageRequest::new(1, 2))
        .await
        .unwrap();

    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.data.len(), 2);
    assert!(page.data.iter().all(|s| s.merchant_id == merchant));
    assert!(page.data[0].created_at >= page.data[1].created_at);
}
