//! Construction of clearing journal entries.

use serde::{Deserialize, Serialize};
use settla_shared::types::AccountId;

use crate::ledger::{Direction, EventType, NewJournalEntry};
use crate::settlement::FeeSplit;

/// Transaction id prefix of clearing entries.
pub const PAYMENT_PREFIX: &str = "PAY-";

/// A captured order payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccess {
    /// Order identifier; clearing is at most once per order.
    pub order_id: String,
    /// Human-readable order number.
    pub order_no: String,
    /// The merchant selling the order.
    pub merchant_id: String,
    /// Gross amount paid, in minor units.
    pub amount: i64,
    /// Fee charged by the payment channel, in minor units.
    pub channel_cost: i64,
}

impl PaymentSuccess {
    /// Transaction id of the entry that clears this payment.
    #[must_use]
    pub fn transaction_id(&self) -> String {
        format!("{PAYMENT_PREFIX}{}", self.order_id)
    }
}

/// The three ledger accounts a clearing entry posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearingAccounts {
    /// Channel receivable (asset), debited with the gross amount.
    pub channel: AccountId,
    /// Merchant payable (liability), credited with the receivable.
    pub merchant: AccountId,
    /// Platform fee income, credited with the fee.
    pub platform: AccountId,
}

/// Ledger entity id of a merchant.
#[must_use]
pub fn merchant_entity_id(merchant_id: &str) -> String {
    format!("MERCH_{merchant_id}")
}

/// Builds the clearing entry for a payment.
///
/// Lines, in order:
/// 1. Debit channel receivable, gross amount
/// 2. Credit merchant payable, merchant receivable
/// 3. Credit platform fee income, platform fee
///
/// A zero-amount leg (zero fee, or a 100% fee) is omitted, since line
/// amounts must be positive. The entry is balanced by construction.
#[must_use]
pub fn build_clearing_entry(
    payment: &PaymentSuccess,
    accounts: ClearingAccounts,
    split: FeeSplit,
) -> NewJournalEntry {
    let mut entry = NewJournalEntry::new(
        payment.transaction_id(),
        EventType::PaymentSuccess,
        format!(
            "Payment clearing for order {} (merchant {})",
            payment.order_no, payment.merchant_id
        ),
    )
    .line(
        accounts.channel,
        Direction::Debit,
        split.gross,
        Some(format!("gross payment {}", payment.order_no)),
    );

    if split.merchant_receivable > 0 {
        entry = entry.line(
            accounts.merchant,
            Direction::Credit,
            split.merchant_receivable,
            Some("merchant receivable".to_string()),
        );
    }
    if split.platform_fee > 0 {
        entry = entry.line(
            accounts.platform,
            Direction::Credit,
            split.platform_fee,
            Some("platform fee".to_string()),
        );
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::validate_entry;
    use crate::settlement::FeeRate;
    use rust_decimal_macros::dec;

    fn payment(amount: i64) -> PaymentSuccess {
        PaymentSuccess {
            order_id: "42".into(),
            order_no: "ORD-42".into(),
            merchant_id: "1001".into(),
            amount,
            channel_cost: 0,
        }
    }

    fn accounts() -> ClearingAccounts {
        ClearingAccounts {
            channel: AccountId::new(),
            merchant: AccountId::new(),
            platform: AccountId::new(),
        }
    }

    #[test]
    fn test_three_line_entry() {
        let accounts = accounts();
        let split = FeeRate::new(dec!(0.006)).unwrap().split(10_000).unwrap();
        let entry = build_clearing_entry(&payment(10_000), accounts, split);

        assert_eq!(entry.transaction_id, "PAY-42");
        assert_eq!(entry.event_type, EventType::PaymentSuccess);
        assert_eq!(entry.lines.len(), 3);

        assert_eq!(entry.lines[0].account_id, accounts.channel);
        assert_eq!(entry.lines[0].direction, Direction::Debit);
        assert_eq!(entry.lines[0].amount, 10_000);
        assert_eq!(entry.lines[1].account_id, accounts.merchant);
        assert_eq!(entry.lines[1].direction, Direction::Credit);
        assert_eq!(entry.lines[1].amount, 9_940);
        assert_eq!(entry.lines[2].account_id, accounts.platform);
        assert_eq!(entry.lines[2].direction, Direction::Credit);
        assert_eq!(entry.lines[2].amount, 60);

        assert!(validate_entry(&entry).is_ok());
    }

    #[test]
    fn test_zero_fee_leg_omitted() {
        let split = FeeRate::new(dec!(0.006)).unwrap().split(100).unwrap();
        let entry = build_clearing_entry(&payment(100), accounts(), split);

        assert_eq!(split.platform_fee, 0);
        assert_eq!(entry.lines.len(), 2);
        assert!(validate_entry(&entry).is_ok());
    }

    #[test]
    fn test_full_fee_leg_omits_merchant() {
        let split = FeeRate::new(dec!(1)).unwrap().split(700).unwrap();
        let accounts = accounts();
        let entry = build_clearing_entry(&payment(700), accounts, split);

        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.lines[1].account_id, accounts.platform);
        assert!(validate_entry(&entry).is_ok());
    }

    #[test]
    fn test_merchant_entity_id() {
        assert_eq!(merchant_entity_id("1001"), "MERCH_1001");
    }
}
