//! Property-based tests for the settlement service.
//!
//! - Running totals equal the sums over the stored details
//! - Each order id is folded in at most once, whatever the interleaving

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::error::SettlementError;
use super::fee::FeeRate;
use super::service::SettlementService;
use super::types::{NewSettlement, OrderInput, SettlementCycle};
use crate::memory::InMemoryStore;

/// Strategy to generate orders as (order id suffix, amount); suffixes repeat.
fn orders() -> impl Strategy<Value = Vec<(u8, i64)>> {
    prop::collection::vec((0u8..12, 1i64..1_000_000), 1..30)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_totals_equal_detail_sums(
        bp in 0i64..=10_000,
        submitted in orders(),
    ) {
        let rate = FeeRate::new(Decimal::new(bp, 4)).unwrap();
        let rt = runtime();
        rt.block_on(async {
            let service = SettlementService::new(Arc::new(InMemoryStore::new()), rate);
            let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
            let settlement = service
                .create_settlement(NewSettlement {
                    merchant_id: "M1".into(),
                    cycle: SettlementCycle::Daily,
                    start_date: day,
                    end_date: day,
                })
                .await
                .unwrap();

            let tasks: Vec<_> = submitted
                .iter()
                .map(|&(suffix, amount)| {
                    let service = service.clone();
                    let id = settlement.id;
                    tokio::spawn(async move {
                        service
                            .add_order_to_settlement(
                                id,
                                OrderInput {
                                    order_id: format!("O{suffix}"),
                                    order_no: format!("NO-{suffix}"),
                                    amount,
                                },
                            )
                            .await
                    })
                })
                .collect();
            for result in futures::future::join_all(tasks).await {
                match result.unwrap() {
                    Ok(_) | Err(SettlementError::DuplicateOrder { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let stored = service.get_settlement(settlement.id).await.unwrap();
            let details = service.settlement_details(settlement.id).await.unwrap();

            let distinct: BTreeSet<_> = submitted.iter().map(|(suffix, _)| *suffix).collect();
            let folded: BTreeSet<_> = details.iter().map(|d| d.order_id.clone()).collect();
            assert_eq!(details.len(), distinct.len());
            assert_eq!(folded.len(), details.len());

            assert_eq!(stored.order_count, i64::try_from(details.len()).unwrap());
            assert_eq!(stored.total_amount, details.iter().map(|d| d.order_amount).sum::<i64>());
            assert_eq!(stored.platform_fee, details.iter().map(|d| d.platform_fee).sum::<i64>());
            assert_eq!(
                stored.settlement_amount,
                details.iter().map(|d| d.settlement_amount).sum::<i64>()
            );
            assert!(stored.is_consistent());

            for detail in &details {
                let split = rate.split(detail.order_amount).unwrap();
                assert_eq!(detail.platform_fee, split.platform_fee);
                assert_eq!(detail.settlement_amount, split.merchant_receivable);
            }
        });
    }
}
