//! Subject definitions and the balance sign convention.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::Direction;

/// Accounting type of a subject.
///
/// - Asset/Expense are debit-normal: a debit increases the balance.
/// - Liability/Equity/Income are credit-normal: a credit increases the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    /// Resources owned, e.g. receivables from a payment channel.
    Asset,
    /// Obligations, e.g. amounts payable to merchants.
    Liability,
    /// Owner's equity.
    Equity,
    /// Revenue, e.g. platform fees.
    Income,
    /// Costs, e.g. payment channel charges.
    Expense,
}

impl SubjectType {
    /// Returns the string representation of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Parses a subject type from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asset" => Some(Self::Asset),
            "liability" => Some(Self::Liability),
            "equity" => Some(Self::Equity),
            "income" | "revenue" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    /// The side that increases an account of this type.
    #[must_use]
    pub fn normal_side(self) -> Direction {
        match self {
            Self::Asset | Self::Expense => Direction::Debit,
            Self::Liability | Self::Equity | Self::Income => Direction::Credit,
        }
    }

    /// Signed balance change for posting `amount` on `direction`.
    ///
    /// `amount` is a validated, positive line amount, so the negation
    /// cannot overflow.
    #[must_use]
    pub fn balance_delta(self, direction: Direction, amount: i64) -> i64 {
        if direction == self.normal_side() {
            amount
        } else {
            -amount
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Unique subject code, e.g. `"2202"`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Accounting type; decides the balance sign convention.
    pub subject_type: SubjectType,
    /// Free-form description.
    pub description: String,
}

impl Subject {
    /// Creates a subject.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        subject_type: SubjectType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            subject_type,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SubjectType::Asset, Direction::Debit, 100)]
    #[case(SubjectType::Asset, Direction::Credit, -100)]
    #[case(SubjectType::Expense, Direction::Debit, 100)]
    #[case(SubjectType::Expense, Direction::Credit, -100)]
    #[case(SubjectType::Liability, Direction::Debit, -100)]
    #[case(SubjectType::Liability, Direction::Credit, 100)]
    #[case(SubjectType::Equity, Direction::Debit, -100)]
    #[case(SubjectType::Equity, Direction::Credit, 100)]
    #[case(SubjectType::Income, Direction::Debit, -100)]
    #[case(SubjectType::Income, Direction::Credit, 100)]
    fn test_balance_delta(
        #[case] subject_type: SubjectType,
        #[case] direction: Direction,
        #[case] expected: i64,
    ) {
        assert_eq!(subject_type.balance_delta(direction, 100), expected);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for t in [
            SubjectType::Asset,
            SubjectType::Liability,
            SubjectType::Equity,
            SubjectType::Income,
            SubjectType::Expense,
        ] {
            assert_eq!(SubjectType::parse(&t.to_string()), Some(t));
        }
        assert_eq!(SubjectType::parse("REVENUE"), Some(SubjectType::Income));
        assert_eq!(SubjectType::parse("bogus"), None);
    }
}
