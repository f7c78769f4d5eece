//! Structural validation of journal entries.

use super::error::LedgerError;
use super::types::{Direction, EntryTotals, NewJournalEntry};

/// Minimum number of lines in a journal entry.
pub const MIN_LINES: usize = 2;

/// Validates an entry before any account is touched.
///
/// Checks, in order:
/// - the transaction id is not blank
/// - there are at least [`MIN_LINES`] lines
/// - every line amount is positive
/// - debit and credit totals fit in an `i64` and are equal
///
/// # Errors
///
/// Returns the first violated rule as a validation-kind `LedgerError`.
pub fn validate_entry(entry: &NewJournalEntry) -> Result<EntryTotals, LedgerError> {
    if entry.transaction_id.trim().is_empty() {
        return Err(LedgerError::MissingTransactionId);
    }

    if entry.lines.len() < MIN_LINES {
        return Err(LedgerError::InsufficientLines(entry.lines.len()));
    }

    let mut totals = EntryTotals::default();
    for (index, line) in entry.lines.iter().enumerate() {
        if line.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount {
                line: index + 1,
                amount: line.amount,
            });
        }

        let side = match line.direction {
            Direction::Debit => &mut totals.debit,
            Direction::Credit => &mut totals.credit,
        };
        *side = side
            .checked_add(line.amount)
            .ok_or(LedgerError::AmountOverflow)?;
    }

    if !totals.is_balanced() {
        return Err(LedgerError::Unbalanced {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EventType;
    use settla_shared::types::AccountId;

    fn entry() -> NewJournalEntry {
        NewJournalEntry::new("TXN-1", EventType::Manual, "test")
    }

    #[test]
    fn test_balanced_entry() {
        let e = entry()
            .debit(AccountId::new(), 10_000)
            .credit(AccountId::new(), 9_940)
            .credit(AccountId::new(), 60);

        let totals = validate_entry(&e).unwrap();
        assert_eq!(totals.debit, 10_000);
        assert_eq!(totals.credit, 10_000);
    }

    #[test]
    fn test_unbalanced_entry() {
        let e = entry()
            .debit(AccountId::new(), 100)
            .credit(AccountId::new(), 90);

        let result = validate_entry(&e);
        assert!(matches!(
            result,
            Err(LedgerError::Unbalanced {
                debit: 100,
                credit: 90
            })
        ));
    }

    #[test]
    fn test_single_line_rejected() {
        let e = entry().debit(AccountId::new(), 100);
        assert!(matches!(
            validate_entry(&e),
            Err(LedgerError::InsufficientLines(1))
        ));
    }

    #[test]
    fn test_no_lines_rejected() {
        assert!(matches!(
            validate_entry(&entry()),
            Err(LedgerError::InsufficientLines(0))
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let e = entry()
            .debit(AccountId::new(), 0)
            .credit(AccountId::new(), 0);
        assert!(matches!(
            validate_entry(&e),
            Err(LedgerError::NonPositiveAmount { line: 1, amount: 0 })
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let e = entry()
            .debit(AccountId::new(), 50)
            .credit(AccountId::new(), -50);
        assert!(matches!(
            validate_entry(&e),
            Err(LedgerError::NonPositiveAmount {
                line: 2,
                amount: -50
            })
        ));
    }

    #[test]
    fn test_blank_transaction_id_rejected() {
        let e = NewJournalEntry::new("  ", EventType::Manual, "test")
            .debit(AccountId::new(), 1)
            .credit(AccountId::new(), 1);
        assert!(matches!(
            validate_entry(&e),
            Err(LedgerError::MissingTransactionId)
        ));
    }

    #[test]
    fn test_overflow_rejected() {
        let e = entry()
            .debit(AccountId::new(), i64::MAX)
            .debit(AccountId::new(), 1)
            .credit(AccountId::new(), 1);
        assert!(matches!(
            validate_entry(&e),
            Err(LedgerError::AmountOverflow)
        ));
    }
}
