//! Property-based tests for fee splitting.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::fee::FeeRate;

/// Strategy to generate a rate in [0, 1] with four decimal places.
fn rate_strategy() -> impl Strategy<Value = FeeRate> {
    (0i64..=10_000i64).prop_map(|bp| FeeRate::new(Decimal::new(bp, 4)).unwrap())
}

/// Strategy to generate a positive amount in minor units.
fn amount_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000_000i64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Fee plus receivable always equals the gross amount.
    #[test]
    fn prop_split_is_additive(rate in rate_strategy(), amount in amount_strategy()) {
        let split = rate.split(amount).unwrap();
        prop_assert_eq!(split.platform_fee + split.merchant_receivable, amount);
    }

    /// The fee never exceeds the gross amount and is never negative.
    #[test]
    fn prop_fee_is_bounded(rate in rate_strategy(), amount in amount_strategy()) {
        let split = rate.split(amount).unwrap();
        prop_assert!(split.platform_fee >= 0);
        prop_assert!(split.platform_fee <= amount);
        prop_assert!(split.merchant_receivable >= 0);
    }

    /// The fee is the floor of amount * rate: it is within one minor unit
    /// below the exact product.
    #[test]
    fn prop_fee_rounds_down(rate in rate_strategy(), amount in amount_strategy()) {
        let split = rate.split(amount).unwrap();
        let exact = Decimal::from(amount) * rate.value();
        let fee = Decimal::from(split.platform_fee);
        prop_assert!(fee <= exact);
        prop_assert!(exact - fee < Decimal::ONE);
    }
}
