//! Ledger domain types: directions, journal entries and their lines.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use settla_shared::types::{AccountId, EntryLineId, JournalEntryId};
use std::fmt;

/// Side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Debit (+1).
    Debit,
    /// Credit (-1).
    Credit,
}

impl Direction {
    /// +1 for debit, -1 for credit.
    #[must_use]
    pub fn sign(self) -> i64 {
        match self {
            Self::Debit => 1,
            Self::Credit => -1,
        }
    }

    /// The other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Returns the string representation of the direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }

    /// Parses a direction from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debit" => Some(Self::Debit),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business event that produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A captured order payment cleared into payable and fee income.
    PaymentSuccess,
    /// Reversal of an earlier entry.
    Reversal,
    /// Manual or system adjustment.
    Adjustment,
    /// Free-form entry posted by an operator.
    Manual,
}

impl EventType {
    /// Returns the string representation of the event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSuccess => "payment_success",
            Self::Reversal => "reversal",
            Self::Adjustment => "adjustment",
            Self::Manual => "manual",
        }
    }

    /// Parses an event type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_success" => Some(Self::PaymentSuccess),
            "reversal" => Some(Self::Reversal),
            "adjustment" => Some(Self::Adjustment),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input line for a new journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntryLine {
    /// The account to post to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub direction: Direction,
    /// Amount in minor currency units (must be positive).
    pub amount: i64,
    /// Optional memo for this line.
    pub memo: Option<String>,
}

/// Input for posting a journal entry.
///
/// `entry_no` and `posting_date` are assigned by the posting engine when absent.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    /// Voucher number; generated when `None`.
    pub entry_no: Option<String>,
    /// Business correlation key. At most one entry is ever posted per value.
    pub transaction_id: String,
    /// The event that produced this entry.
    pub event_type: EventType,
    /// Accounting date; today (UTC) when `None`.
    pub posting_date: Option<NaiveDate>,
    /// Description of the entry.
    pub description: String,
    /// Ordered lines.
    pub lines: Vec<NewEntryLine>,
}

impl NewJournalEntry {
    /// Starts an entry with no lines.
    #[must_use]
    pub fn new(
        transaction_id: impl Into<String>,
        event_type: EventType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            entry_no: None,
            transaction_id: transaction_id.into(),
            event_type,
            posting_date: None,
            description: description.into(),
            lines: Vec::new(),
        }
    }

    /// Appends a debit line.
    #[must_use]
    pub fn debit(self, account_id: AccountId, amount: i64) -> Self {
        self.line(account_id, Direction::Debit, amount, None)
    }

    /// Appends a credit line.
    #[must_use]
    pub fn credit(self, account_id: AccountId, amount: i64) -> Self {
        self.line(account_id, Direction::Credit, amount, None)
    }

    /// Appends a line with an optional memo.
    #[must_use]
    pub fn line(
        mut self,
        account_id: AccountId,
        direction: Direction,
        amount: i64,
        memo: Option<String>,
    ) -> Self {
        self.lines.push(NewEntryLine {
            account_id,
            direction,
            amount,
            memo,
        });
        self
    }

    /// Sets the posting date.
    #[must_use]
    pub fn on(mut self, posting_date: NaiveDate) -> Self {
        self.posting_date = Some(posting_date);
        self
    }
}

/// One debit or credit leg of a posted journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    /// Unique identifier.
    pub id: EntryLineId,
    /// The entry this line belongs to.
    pub entry_id: JournalEntryId,
    /// 1-based position within the entry.
    pub line_no: i32,
    /// The account posted to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub direction: Direction,
    /// Positive amount in minor currency units.
    pub amount: i64,
    /// Optional memo.
    pub memo: Option<String>,
}

/// A journal entry (voucher). Immutable once posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Globally unique voucher number.
    pub entry_no: String,
    /// Business correlation / idempotency key.
    pub transaction_id: String,
    /// The event that produced this entry.
    pub event_type: EventType,
    /// Accounting date.
    pub posting_date: NaiveDate,
    /// Description.
    pub description: String,
    /// Ordered, non-empty lines.
    pub lines: Vec<EntryLine>,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Sums debit and credit lines.
    ///
    /// Amounts are validated before posting, so saturating addition only
    /// matters for hand-built values.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        let mut totals = EntryTotals::default();
        for line in &self.lines {
            match line.direction {
                Direction::Debit => totals.debit = totals.debit.saturating_add(line.amount),
                Direction::Credit => totals.credit = totals.credit.saturating_add(line.amount),
            }
        }
        totals
    }
}

/// Debit and credit sums of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debit lines.
    pub debit: i64,
    /// Sum of credit lines.
    pub credit: i64,
}

impl EntryTotals {
    /// Returns true if debits equal credits.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign_and_opposite() {
        assert_eq!(Direction::Debit.sign(), 1);
        assert_eq!(Direction::Credit.sign(), -1);
        assert_eq!(Direction::Debit.opposite(), Direction::Credit);
        assert_eq!(Direction::Credit.opposite(), Direction::Debit);
    }

    #[test]
    fn test_event_type_parse() {
        assert_eq!(
            EventType::parse("payment_success"),
            Some(EventType::PaymentSuccess)
        );
        assert_eq!(EventType::parse(EventType::Reversal.as_str()), Some(EventType::Reversal));
        assert_eq!(EventType::parse("PAYMENT"), None);
    }

    #[test]
    fn test_builder_appends_lines_in_order() {
        let cash = AccountId::new();
        let payable = AccountId::new();
        let entry = NewJournalEntry::new("T-1", EventType::Manual, "test")
            .debit(cash, 100)
            .credit(payable, 100);

        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.lines[0].account_id, cash);
        assert_eq!(entry.lines[0].direction, Direction::Debit);
        assert_eq!(entry.lines[1].account_id, payable);
        assert_eq!(entry.lines[1].direction, Direction::Credit);
        assert!(entry.entry_no.is_none());
    }
}
