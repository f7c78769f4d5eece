//! Property-based tests for journal entry validation.
//!
//! - Balanced entries with positive amounts are always accepted
//! - Any non-positive line amount is rejected
//! - Any debit/credit mismatch is rejected

use proptest::prelude::*;
use settla_shared::types::AccountId;

use super::error::LedgerError;
use super::types::{Direction, EventType, NewJournalEntry};
use super::validation::validate_entry;

/// Strategy to generate a valid positive amount in minor units.
fn positive_amount() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy to generate a zero or negative amount.
fn non_positive_amount() -> impl Strategy<Value = i64> {
    -100_000_000i64..=0i64
}

/// Strategy to generate a direction.
fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Debit), Just(Direction::Credit)]
}

/// Builds an entry whose debit lines are `debits` and a single balancing credit.
fn balanced_entry(debits: &[i64]) -> NewJournalEntry {
    let total: i64 = debits.iter().sum();
    let mut entry = NewJournalEntry::new("TXN-PROP", EventType::Manual, "prop");
    for amount in debits {
        entry = entry.debit(AccountId::new(), *amount);
    }
    entry.credit(AccountId::new(), total)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A credit split across many lines balancing one debit is accepted, and the
    /// reported totals equal the debit amount.
    #[test]
    fn prop_balanced_entries_accepted(
        debits in prop::collection::vec(positive_amount(), 1..10),
    ) {
        let entry = balanced_entry(&debits);
        let expected: i64 = debits.iter().sum();

        let totals = validate_entry(&entry);
        prop_assert!(totals.is_ok(), "balanced entry should be accepted");
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, expected);
        prop_assert_eq!(totals.credit, expected);
    }

    /// Replacing any line's amount with a non-positive value is rejected and the
    /// error names that line.
    #[test]
    fn prop_non_positive_amount_rejected(
        debits in prop::collection::vec(positive_amount(), 1..10),
        bad in non_positive_amount(),
        index in any::<prop::sample::Index>(),
    ) {
        let mut entry = balanced_entry(&debits);
        let position = index.index(entry.lines.len());
        entry.lines[position].amount = bad;

        match validate_entry(&entry) {
            Err(LedgerError::NonPositiveAmount { line, amount }) => {
                prop_assert_eq!(line, position + 1);
                prop_assert_eq!(amount, bad);
            }
            other => prop_assert!(false, "expected NonPositiveAmount, got {:?}", other),
        }
    }

    /// Any non-zero imbalance is rejected with both totals reported.
    #[test]
    fn prop_unbalanced_rejected(
        debit in positive_amount(),
        skew in 1i64..1_000i64,
        skew_side in direction_strategy(),
    ) {
        let credit = match skew_side {
            Direction::Debit => debit + skew,
            Direction::Credit => debit.saturating_sub(skew).max(1),
        };
        prop_assume!(credit != debit);

        let entry = NewJournalEntry::new("TXN-PROP", EventType::Manual, "prop")
            .debit(AccountId::new(), debit)
            .credit(AccountId::new(), credit);

        let is_unbalanced = matches!(
            validate_entry(&entry),
            Err(LedgerError::Unbalanced { debit: d, credit: c }) if d == debit && c == credit
        );
        prop_assert!(is_unbalanced);
    }

    /// Entries with fewer than two lines are rejected whatever the amounts.
    #[test]
    fn prop_single_line_rejected(
        amount in positive_amount(),
        direction in direction_strategy(),
    ) {
        let entry = NewJournalEntry::new("TXN-PROP", EventType::Manual, "prop")
            .line(AccountId::new(), direction, amount, None);

        let is_insufficient = matches!(
            validate_entry(&entry),
            Err(LedgerError::InsufficientLines(1))
        );
        prop_assert!(is_insufficient);
    }
}
