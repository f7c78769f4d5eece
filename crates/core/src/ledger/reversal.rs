//! Reversing entries.

use super::types::{EventType, JournalEntry, NewJournalEntry};

/// Transaction id prefix of reversing entries.
pub const REVERSAL_PREFIX: &str = "REV-";

/// Builds the entry that reverses `original`.
///
/// Every line is copied with its direction swapped, so posting the result
/// restores each touched balance. The transaction id is derived from the
/// original's, which makes a second reversal of the same entry a duplicate.
#[must_use]
pub fn build_reversal(original: &JournalEntry, reason: &str) -> NewJournalEntry {
    let mut reversal = NewJournalEntry::new(
        format!("{REVERSAL_PREFIX}{}", original.transaction_id),
        EventType::Reversal,
        format!("Reversal of {}: {reason}", original.entry_no),
    );
    for line in &original.lines {
        reversal = reversal.line(
            line.account_id,
            line.direction.opposite(),
            line.amount,
            line.memo.clone(),
        );
    }
    reversal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Direction, EntryLine};
    use chrono::{NaiveDate, Utc};
    use settla_shared::types::{AccountId, EntryLineId, JournalEntryId};

    #[test]
    fn test_reversal_swaps_directions() {
        let entry_id = JournalEntryId::new();
        let cash = AccountId::new();
        let payable = AccountId::new();
        let original = JournalEntry {
            id: entry_id,
            entry_no: "JE0001".to_string(),
            transaction_id: "PAY-42".to_string(),
            event_type: EventType::PaymentSuccess,
            posting_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            description: "payment".to_string(),
            lines: vec![
                EntryLine {
                    id: EntryLineId::new(),
                    entry_id,
                    line_no: 1,
                    account_id: cash,
                    direction: Direction::Debit,
                    amount: 500,
                    memo: Some("gross".to_string()),
                },
                EntryLine {
                    id: EntryLineId::new(),
                    entry_id,
                    line_no: 2,
                    account_id: payable,
                    direction: Direction::Credit,
                    amount: 500,
                    memo: None,
                },
            ],
            created_at: Utc::now(),
        };

        let reversal = build_reversal(&original, "chargeback");

        assert_eq!(reversal.transaction_id, "REV-PAY-42");
        assert_eq!(reversal.event_type, EventType::Reversal);
        assert!(reversal.description.contains("JE0001"));
        assert!(reversal.description.contains("chargeback"));
        assert_eq!(reversal.lines.len(), 2);
        assert_eq!(reversal.lines[0].account_id, cash);
        assert_eq!(reversal.lines[0].direction, Direction::Credit);
        assert_eq!(reversal.lines[0].memo.as_deref(), Some("gross"));
        assert_eq!(reversal.lines[1].account_id, payable);
        assert_eq!(reversal.lines[1].direction, Direction::Debit);
        assert_eq!(reversal.lines[1].amount, 500);
    }
}
