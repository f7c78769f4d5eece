//! Property-based tests for the posting engine.
//!
//! - Concurrent postings never lose an update
//! - Every stored balance reconciles with its posted lines
//! - The ledger as a whole stays balanced

use std::sync::Arc;

use proptest::prelude::*;

use super::service::PostingEngine;
use super::types::{EventType, NewJournalEntry};
use crate::chart::{CHANNEL_RECEIVABLE, MERCHANT_PAYABLE, PLATFORM_FEE_INCOME};
use crate::memory::InMemoryStore;

/// Strategy to generate a payment as (gross amount, fee) with fee < amount.
fn payment() -> impl Strategy<Value = (i64, i64)> {
    (2i64..1_000_000i64).prop_flat_map(|amount| (Just(amount), 0i64..amount))
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

    /// Posting a batch of payments concurrently against shared accounts leaves
    /// each account at exactly the sum of its deltas, with one version bump per
    /// entry, and reconciliation agrees with the stored balance.
    #[test]
    fn prop_concurrent_postings_are_not_lost(
        payments in prop::collection::vec(payment(), 1..24),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let engine = PostingEngine::new(Arc::new(InMemoryStore::new()), "CNY");
            let channel = engine.create_account(CHANNEL_RECEIVABLE, "CHANNEL_GLOBAL").await.unwrap();
            let merchant = engine.create_account(MERCHANT_PAYABLE, "MERCH_1").await.unwrap();
            let platform = engine.create_account(PLATFORM_FEE_INCOME, "PLATFORM_MAIN").await.unwrap();

            let tasks: Vec<_> = payments
                .iter()
                .enumerate()
                .map(|(i, (amount, fee))| {
                    let engine = engine.clone();
                    let mut entry = NewJournalEntry::new(format!("PAY-{i}"), EventType::PaymentSuccess, "prop")
                        .debit(channel.id, *amount)
                        .credit(merchant.id, amount - fee);
                    if *fee > 0 {
                        entry = entry.credit(platform.id, *fee);
                    }
                    tokio::spawn(async move { engine.post_entry(entry).await })
                })
                .collect();

            for result in futures::future::join_all(tasks).await {
                result.unwrap().unwrap();
            }

            let gross: i64 = payments.iter().map(|(a, _)| a).sum();
            let fees: i64 = payments.iter().map(|(_, f)| f).sum();
            let entries = i64::try_from(payments.len()).unwrap();

            let channel = engine.get_account_by_id(channel.id).await.unwrap();
            let merchant = engine.get_account_by_id(merchant.id).await.unwrap();
            let platform = engine.get_account_by_id(platform.id).await.unwrap();

            assert_eq!(channel.balance, gross);
            assert_eq!(merchant.balance, gross - fees);
            assert_eq!(platform.balance, fees);
            assert_eq!(channel.version, entries);
            assert_eq!(merchant.version, entries);

            // Debit-normal total equals credit-normal total.
            assert_eq!(channel.balance, merchant.balance + platform.balance);

            for id in [channel.id, merchant.id, platform.id] {
                assert!(engine.reconcile_account(id).await.unwrap().is_balanced());
            }
        });
    }
}
