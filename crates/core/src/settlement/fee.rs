//! Platform fee computation.
//!
//! Fee rates are fractions of the gross amount (`0.006` is 0.6%). The fee is
//! rounded down to the minor unit, so the merchant never receives less than
//! `amount - amount * rate`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::SettlementError;

/// A platform fee rate in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeeRate(Decimal);

impl FeeRate {
    /// A rate that charges nothing.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a fee rate.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::InvalidFeeRate` if `rate` is outside `[0, 1]`.
    pub fn new(rate: Decimal) -> Result<Self, SettlementError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(SettlementError::InvalidFeeRate(rate));
        }
        Ok(Self(rate))
    }

    /// The rate as a fraction.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Splits a gross amount into platform fee and merchant receivable.
    ///
    /// `platform_fee = floor(amount * rate)` and
    /// `merchant_receivable = amount - platform_fee`.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::NonPositiveAmount` if `amount <= 0`.
    pub fn split(self, amount: i64) -> Result<FeeSplit, SettlementError> {
        if amount <= 0 {
            return Err(SettlementError::NonPositiveAmount(amount));
        }
        let platform_fee = Decimal::from(amount)
            .checked_mul(self.0)
            .and_then(|fee| fee.floor().to_i64())
            .ok_or(SettlementError::AmountOverflow)?;
        Ok(FeeSplit {
            gross: amount,
            platform_fee,
            merchant_receivable: amount - platform_fee,
        })
    }
}

impl TryFrom<Decimal> for FeeRate {
    type Error = SettlementError;

    fn try_from(rate: Decimal) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<FeeRate> for Decimal {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A gross amount split into its two downstream obligations.
///
/// Invariant: `platform_fee + merchant_receivable == gross`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Gross amount paid by the customer.
    pub gross: i64,
    /// Commission retained by the platform.
    pub platform_fee: i64,
    /// Amount owed to the merchant.
    pub merchant_receivable: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0.006), 10_000, 60, 9_940)]
    #[case(dec!(0.01), 1_000, 10, 990)]
    #[case(dec!(0.01), 2_000, 20, 1_980)]
    #[case(dec!(0.006), 500, 3, 497)]
    #[case(dec!(0.006), 100, 0, 100)]
    #[case(dec!(0.0333), 99, 3, 96)]
    #[case(dec!(0), 12_345, 0, 12_345)]
    #[case(dec!(1), 12_345, 12_345, 0)]
    fn test_split(
        #[case] rate: Decimal,
        #[case] amount: i64,
        #[case] fee: i64,
        #[case] receivable: i64,
    ) {
        let split = FeeRate::new(rate).unwrap().split(amount).unwrap();
        assert_eq!(split.gross, amount);
        assert_eq!(split.platform_fee, fee);
        assert_eq!(split.merchant_receivable, receivable);
    }

    #[rstest]
    #[case(dec!(-0.001))]
    #[case(dec!(1.0001))]
    #[case(dec!(60))]
    fn test_invalid_rate(#[case] rate: Decimal) {
        assert!(matches!(
            FeeRate::new(rate),
            Err(SettlementError::InvalidFeeRate(_))
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    fn test_non_positive_amount(#[case] amount: i64) {
        let rate = FeeRate::new(dec!(0.006)).unwrap();
        assert!(matches!(
            rate.split(amount),
            Err(SettlementError::NonPositiveAmount(a)) if a == amount
        ));
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let rate: FeeRate = serde_json::from_str("\"0.006\"").unwrap();
        assert_eq!(rate.value(), dec!(0.006));
        assert!(serde_json::from_str::<FeeRate>("\"1.5\"").is_err());
    }
}
